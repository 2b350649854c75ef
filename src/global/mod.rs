use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "duorec";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default directory for recordings: `~/records`.
pub fn default_savedir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("records"))
        .ok_or_else(|| anyhow!("Unable to determine home directory"))
}
