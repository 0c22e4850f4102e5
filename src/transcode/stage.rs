//! Stage contracts for the transcode pipeline
//!
//! Decoder, reformatter and encoder do not consume and produce items 1:1.
//! Each one is driven as submit-then-drain: after every `submit` the caller
//! keeps calling `receive` until it answers [`Pull::NeedMoreInput`]. After
//! `flush`, `receive` drains buffered items until [`Pull::EndOfStream`].

use crate::error::Result;

/// Outcome of asking a stage for its next item
#[derive(Debug, PartialEq, Eq)]
pub enum Pull<T> {
    /// An item was produced
    Ready(T),
    /// Nothing buffered; submit more input
    NeedMoreInput,
    /// The stage was flushed and is fully drained
    EndOfStream,
}

/// Upstream end of the pipeline
pub trait PacketSource {
    type Packet;

    /// Next packet of the selected stream, or `EndOfStream`
    fn read_next(&mut self) -> Result<Pull<Self::Packet>>;
}

/// A buffering transform between source and sink
pub trait Stage {
    type Input;
    type Output;

    fn submit(&mut self, input: Self::Input) -> Result<()>;

    fn receive(&mut self) -> Result<Pull<Self::Output>>;

    /// Signal that no more input will be submitted
    fn flush(&mut self) -> Result<()>;
}

/// Downstream end of the pipeline
pub trait PacketSink {
    type Packet;

    /// Write one packet; packets arrive in encoder output order
    fn write(&mut self, packet: Self::Packet) -> Result<()>;

    /// Write the container trailer. Called once, after the last packet.
    fn finalize(&mut self) -> Result<()>;
}

/// A block of audio with a known per-channel sample count
pub trait AudioBlock {
    fn sample_count(&self) -> usize;
}

/// A frame that can carry a presentation timestamp
pub trait Stamp: AudioBlock {
    fn set_timestamp(&mut self, pts: i64);
}

impl AudioBlock for ffmpeg_next::util::frame::Audio {
    fn sample_count(&self) -> usize {
        self.samples()
    }
}

impl Stamp for ffmpeg_next::util::frame::Audio {
    fn set_timestamp(&mut self, pts: i64) {
        self.set_pts(Some(pts));
    }
}
