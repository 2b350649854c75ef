pub mod args;
pub mod config;
pub mod devices;
pub mod mix;
pub mod record;

pub use args::{Cli, CliCommand};
pub use config::handle_config_command;
pub use devices::handle_devices_command;
pub use mix::handle_mix_command;
pub use record::handle_record_command;

use crate::audio::{AudioHost, CpalHost, SyntheticHost};
use std::sync::Arc;

fn audio_host(synthetic: bool) -> Arc<dyn AudioHost> {
    if synthetic {
        Arc::new(SyntheticHost::demo())
    } else {
        Arc::new(CpalHost::new())
    }
}
