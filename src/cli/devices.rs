use anyhow::Result;

use super::args::DevicesCliArgs;
use crate::audio::DeviceCatalog;

pub fn handle_devices_command(args: DevicesCliArgs) -> Result<()> {
    let catalog = DeviceCatalog::new(super::audio_host(args.synthetic));
    let devices = catalog.list_input_devices();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No input devices found.");
        return Ok(());
    }

    println!("Found {} input device(s):\n", devices.len());
    for device in devices {
        println!(
            "  [{}] {} ({} ch)",
            device.index, device.name, device.max_input_channels
        );
    }

    Ok(())
}
