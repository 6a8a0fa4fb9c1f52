//! On-disk configuration for the demonstration binary, mirroring
//! `settings::Settings`: a serializable struct with a `Default` and a
//! `load`/`save` pair against a JSON file. Not used by the convolution core
//! itself — `ConvolutionManager::new` takes plain parameters and has no
//! knowledge of the file system.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub sample_rate: u32,
    pub block_size: usize,
    pub ir_path: Option<String>,
    pub max_head_partitions: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 128,
            ir_path: None,
            max_head_partitions: 8,
        }
    }
}

impl EngineSettings {
    const SETTINGS_FILE: &'static str = "rtconvolve.json";

    pub fn load() -> Result<Self> {
        let path = Self::settings_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path).context("failed to read settings file")?;
            let settings: Self =
                serde_json::from_str(&contents).context("failed to parse settings")?;
            info!("loaded settings from {path:?}");
            Ok(settings)
        } else {
            info!("no settings file found at {path:?}, using defaults");
            let settings = Self::default();
            let _ = settings.save();
            Ok(settings)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(&path, json).context("failed to write settings file")?;
        info!("saved settings to {path:?}");
        Ok(())
    }

    fn settings_path() -> Result<PathBuf> {
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            Ok(PathBuf::from(config_dir)
                .join("rtconvolve")
                .join(Self::SETTINGS_FILE))
        } else if let Ok(home) = std::env::var("HOME") {
            Ok(PathBuf::from(home)
                .join(".config")
                .join("rtconvolve")
                .join(Self::SETTINGS_FILE))
        } else {
            Ok(PathBuf::from(".").join(Self::SETTINGS_FILE))
        }
    }
}
