//! castdrop
//!
//! Encodes lossless or uncompressed podcast audio (FLAC, WAV, ...) into a
//! constant-bitrate MP3 ready for publishing: 112 kbps mono by default or
//! 192 kbps stereo, 44.1 kHz.
//!
//! ```no_run
//! use castdrop::{ChannelMode, PipelineConfig, Transcoder};
//!
//! let config = PipelineConfig::new("episode.flac", "episode.mp3", ChannelMode::Mono)?;
//! let mut transcoder = Transcoder::new(config);
//! transcoder.initialize()?;
//! let summary = transcoder.encode(None)?;
//! println!("{:.1}s encoded", summary.duration_secs);
//! # Ok::<(), castdrop::CastError>(())
//! ```

pub mod config;
pub mod config_file;
pub mod error;
pub mod ffmpeg;
pub mod progress;
pub mod stats;
pub mod transcode;

#[cfg(test)]
mod tests;

pub use config::{ChannelMode, OutputProfile, PipelineConfig};
pub use error::{CastError, ErrorKind, Result};
pub use progress::{progress_channel, ProgressReporter, ProgressSnapshot, ProgressStats};
pub use stats::{file_stats, FileStats};
pub use transcode::{EncodeSummary, PipelineState, StreamProfile, Transcoder};
