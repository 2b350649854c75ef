use anyhow::{Context, Result};

use crate::config::Config;

pub fn handle_config_command() -> Result<()> {
    let path = Config::config_path()?;
    let config = Config::load_from(&path)?;

    println!("Config file: {}", path.display());
    println!("Save directory: {}", config.recording.savedir()?.display());
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );
    Ok(())
}
