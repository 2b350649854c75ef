use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory for recorded and mixed files. Defaults to `~/records`.
    pub savedir: Option<PathBuf>,
    pub sample_rate: u32,
    /// Device preselected for slot 1, by display name.
    pub device1: Option<String>,
    /// Device preselected for slot 2, by display name.
    pub device2: Option<String>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            savedir: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            device1: None,
            device2: None,
        }
    }
}

impl RecordingConfig {
    pub fn savedir(&self) -> Result<PathBuf> {
        match &self.savedir {
            Some(dir) => Ok(dir.clone()),
            None => global::default_savedir(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, writing a default config there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, creating default at {:?}", path);
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
