//! Configuration file support
//!
//! Loads encoder settings from TOML files. Every section is optional; missing
//! keys fall back to the same values as [`ConfigFile::default_config`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ChannelMode;
use crate::error::{CastError, Result};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Encoding settings
    #[serde(default)]
    pub encoding: EncodingSettings,
    /// Progress reporting settings
    #[serde(default)]
    pub progress: ProgressSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodingSettings {
    /// Encode as 192 kbps stereo instead of 112 kbps mono
    #[serde(default)]
    pub stereo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Capacity of the bounded progress channel
    pub channel_capacity: usize,
    /// Emit a progress log line every N percent
    pub log_every_percent: u8,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 10,
            log_every_percent: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CastError::Config(format!("invalid config file {:?}: {}", path, e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CastError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Output channel mode selected by this file
    pub fn channel_mode(&self) -> ChannelMode {
        ChannelMode::from_stereo_flag(self.encoding.stereo)
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}
