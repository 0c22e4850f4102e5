//! Audio transcoding module
//!
//! Converts one lossless or uncompressed podcast recording into a
//! constant-bitrate MP3:
//! - Source reader: demuxes the first audio stream
//! - Decoder: packets to PCM frames in the codec's native format
//! - Reformatter: resample to 44.1 kHz, mix to mono/stereo, cut into
//!   encoder-sized frames
//! - Encoder: LAME MP3 at the preset bitrate
//! - Sink writer: MP3 container on disk
//!
//! [`Transcoder`] owns all of them and drives the loop.

pub mod chunker;
pub mod decoder;
pub mod driver;
pub mod encoder;
pub mod pipeline;
pub mod reformat;
pub mod sink;
pub mod source;
pub mod stage;

pub use encoder::is_mp3_encoder_available;
pub use pipeline::{EncodeSummary, PipelineState, Transcoder};
pub use source::{describe_channels, StreamProfile};
