//! Encoding configuration
//!
//! The output side of the pipeline has exactly two presets, selected by
//! [`ChannelMode`]. Both share the sample rate, LAME quality level and
//! lowpass cutoff; they differ in channel count and bitrate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CastError, Result};

/// Output sample rate shared by both presets
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;
/// LAME quality preset (`-q 3`)
pub const OUTPUT_QUALITY_LEVEL: i32 = 3;
/// Lowpass cutoff frequency in Hz
pub const OUTPUT_LOWPASS_HZ: u32 = 20500;

/// Bitrate of the mono preset in bps
pub const MONO_BITRATE: u64 = 112_000;
/// Bitrate of the stereo preset in bps
pub const STEREO_BITRATE: u64 = 192_000;

/// Output channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    #[default]
    Mono,
    Stereo,
}

impl ChannelMode {
    pub fn from_stereo_flag(stereo: bool) -> Self {
        if stereo {
            ChannelMode::Stereo
        } else {
            ChannelMode::Mono
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelMode::Mono => "mono",
            ChannelMode::Stereo => "stereo",
        }
    }
}

/// Fixed output format handed to the reformatter, encoder and sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputProfile {
    pub mode: ChannelMode,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub bitrate_bps: u64,
    pub quality_level: i32,
    pub lowpass_hz: u32,
}

impl OutputProfile {
    /// 112 kbps mono preset
    pub fn mono() -> Self {
        Self {
            mode: ChannelMode::Mono,
            sample_rate: OUTPUT_SAMPLE_RATE,
            channel_count: 1,
            bitrate_bps: MONO_BITRATE,
            quality_level: OUTPUT_QUALITY_LEVEL,
            lowpass_hz: OUTPUT_LOWPASS_HZ,
        }
    }

    /// 192 kbps stereo preset
    pub fn stereo() -> Self {
        Self {
            mode: ChannelMode::Stereo,
            channel_count: 2,
            bitrate_bps: STEREO_BITRATE,
            ..Self::mono()
        }
    }

    pub fn for_mode(mode: ChannelMode) -> Self {
        match mode {
            ChannelMode::Mono => Self::mono(),
            ChannelMode::Stereo => Self::stereo(),
        }
    }

    /// Bitrate in whole kbps, for display
    pub fn bitrate_kbps(&self) -> u64 {
        self.bitrate_bps / 1000
    }

    /// Human-readable preset name, e.g. "Mono 112kbps"
    pub fn describe(&self) -> String {
        let mode = match self.mode {
            ChannelMode::Mono => "Mono",
            ChannelMode::Stereo => "Stereo",
        };
        format!("{} {}kbps", mode, self.bitrate_kbps())
    }
}

impl Default for OutputProfile {
    fn default() -> Self {
        Self::mono()
    }
}

/// Input/output paths plus the selected output preset
///
/// Holds no native resources. Constructed through [`PipelineConfig::new`],
/// which rejects empty paths; deserialized values are checked again by
/// [`PipelineConfig::validate`] when the pipeline initializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    input_path: PathBuf,
    output_path: PathBuf,
    #[serde(default)]
    output_profile: OutputProfile,
}

impl PipelineConfig {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        mode: ChannelMode,
    ) -> Result<Self> {
        let config = Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            output_profile: OutputProfile::for_mode(mode),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that both paths are non-empty
    pub fn validate(&self) -> Result<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(CastError::Config("input path is required".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(CastError::Config("output path is required".into()));
        }
        Ok(())
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn output_profile(&self) -> &OutputProfile {
        &self.output_profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_presets() {
        let mono = OutputProfile::mono();
        assert_eq!(mono.channel_count, 1);
        assert_eq!(mono.bitrate_bps, 112_000);
        assert_eq!(mono.sample_rate, 44100);
        assert_eq!(mono.quality_level, 3);
        assert_eq!(mono.lowpass_hz, 20500);

        let stereo = OutputProfile::stereo();
        assert_eq!(stereo.channel_count, 2);
        assert_eq!(stereo.bitrate_bps, 192_000);
        assert_eq!(stereo.sample_rate, 44100);
        assert_eq!(stereo.quality_level, 3);
        assert_eq!(stereo.lowpass_hz, 20500);
    }

    #[test]
    fn test_default_profile_is_mono() {
        assert_eq!(OutputProfile::default(), OutputProfile::mono());
        assert_eq!(ChannelMode::default(), ChannelMode::Mono);
    }

    #[test]
    fn test_describe() {
        assert_eq!(OutputProfile::mono().describe(), "Mono 112kbps");
        assert_eq!(OutputProfile::stereo().describe(), "Stereo 192kbps");
    }

    #[test]
    fn test_from_stereo_flag() {
        assert_eq!(ChannelMode::from_stereo_flag(true), ChannelMode::Stereo);
        assert_eq!(ChannelMode::from_stereo_flag(false), ChannelMode::Mono);
    }

    #[test]
    fn test_pipeline_config_rejects_empty_paths() {
        let err = PipelineConfig::new("", "out.mp3", ChannelMode::Mono).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = PipelineConfig::new("in.flac", "", ChannelMode::Mono).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("output path"));
    }

    #[test]
    fn test_pipeline_config_selects_profile() {
        let config = PipelineConfig::new("in.flac", "out.mp3", ChannelMode::Stereo).unwrap();
        assert_eq!(config.output_profile().channel_count, 2);
        assert_eq!(config.input_path(), Path::new("in.flac"));
        assert_eq!(config.output_path(), Path::new("out.mp3"));
    }

    #[test]
    fn test_deserialized_config_is_revalidated() {
        let config: PipelineConfig =
            toml::from_str("input_path = \"in.wav\"\noutput_path = \"\"\n").unwrap();
        assert_eq!(*config.output_profile(), OutputProfile::mono());
        assert!(config.validate().is_err());
    }
}
