use anyhow::{Context, Result};

use super::args::MixCliArgs;
use crate::audio::{mixed_path_for, AudioMixer};

pub fn handle_mix_command(args: MixCliArgs) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| mixed_path_for(&args.first));

    let summary = AudioMixer::mix(&args.first, &args.second, &output)
        .with_context(|| format!("Failed to mix {:?} and {:?}", args.first, args.second))?;

    println!(
        "Mixed into {} ({} ch, {} Hz, {:.1}s)",
        summary.path.display(),
        summary.channels,
        summary.sample_rate,
        summary.frames as f64 / summary.sample_rate as f64
    );
    Ok(())
}
