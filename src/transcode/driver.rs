//! Stage loop: moves data source → decoder → reformatter → encoder → sink
//!
//! Written against the traits in [`super::stage`] so the ordering rules can
//! be tested without FFmpeg. Two rules matter for output correctness:
//!
//! - Every `submit` is followed by draining `receive` until the stage asks
//!   for more input. Stages never map 1:1.
//! - At end of input the stages are flushed strictly upstream first:
//!   decoder, then reformatter, then encoder. Each flushed stage is drained
//!   all the way into the sink before the next one is flushed, otherwise its
//!   buffered tail never reaches the encoder.

use tokio_util::sync::CancellationToken;

use crate::error::{CastError, Result};
use crate::progress::ProgressSnapshot;

use super::stage::{AudioBlock, PacketSink, PacketSource, Pull, Stage, Stamp};

/// Counters collected while driving the stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveStats {
    /// Samples per channel leaving the decoder, at the source rate
    pub samples_decoded: u64,
    /// Samples per channel handed to the encoder, at the output rate
    pub samples_encoded: u64,
    pub frames_encoded: u64,
    pub packets_written: u64,
}

/// Borrowed stages plus loop bookkeeping for one encode run
pub struct Driver<'a, S, D, R, E, K> {
    source: &'a mut S,
    decoder: &'a mut D,
    reformatter: &'a mut R,
    encoder: &'a mut E,
    sink: &'a mut K,
    samples_total: Option<u64>,
    progress: Option<&'a mut dyn FnMut(ProgressSnapshot)>,
    cancel: Option<&'a CancellationToken>,
    /// Next synthetic pts, in output samples
    next_pts: i64,
    stats: DriveStats,
}

impl<'a, S, D, R, E, K> Driver<'a, S, D, R, E, K>
where
    S: PacketSource,
    D: Stage<Input = S::Packet>,
    D::Output: AudioBlock,
    R: Stage<Input = D::Output>,
    R::Output: Stamp,
    E: Stage<Input = R::Output>,
    K: PacketSink<Packet = E::Output>,
{
    pub fn new(
        source: &'a mut S,
        decoder: &'a mut D,
        reformatter: &'a mut R,
        encoder: &'a mut E,
        sink: &'a mut K,
    ) -> Self {
        Self {
            source,
            decoder,
            reformatter,
            encoder,
            sink,
            samples_total: None,
            progress: None,
            cancel: None,
            next_pts: 0,
            stats: DriveStats::default(),
        }
    }

    /// Estimated total samples at the source rate. Progress is only reported
    /// when this is known and non-zero.
    pub fn with_total(mut self, samples_total: Option<u64>) -> Self {
        self.samples_total = samples_total.filter(|&n| n > 0);
        self
    }

    /// Called after every decoded frame while the total is known
    pub fn with_progress(mut self, progress: &'a mut dyn FnMut(ProgressSnapshot)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, cancel: Option<&'a CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Main loop: read packets until the source reports end of stream.
    pub fn pump(&mut self) -> Result<()> {
        loop {
            self.check_cancelled()?;
            match self.source.read_next()? {
                Pull::Ready(packet) => {
                    self.decoder.submit(packet)?;
                    self.drain_decoder()?;
                }
                Pull::NeedMoreInput => continue,
                Pull::EndOfStream => return Ok(()),
            }
        }
    }

    /// End-of-stream flush, upstream first.
    pub fn flush(&mut self) -> Result<()> {
        tracing::debug!("Flushing decoder");
        self.decoder.flush()?;
        self.drain_decoder()?;
        self.check_cancelled()?;

        tracing::debug!("Flushing reformatter");
        self.reformatter.flush()?;
        self.drain_reformatter()?;
        self.check_cancelled()?;

        tracing::debug!("Flushing encoder");
        self.encoder.flush()?;
        self.drain_encoder()
    }

    /// Write the container trailer
    pub fn finish(&mut self) -> Result<DriveStats> {
        self.sink.finalize()?;
        Ok(self.stats)
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(CastError::Cancelled),
            _ => Ok(()),
        }
    }

    fn drain_decoder(&mut self) -> Result<()> {
        while let Pull::Ready(frame) = self.decoder.receive()? {
            self.record_decoded(frame.sample_count());
            self.reformatter.submit(frame)?;
            self.drain_reformatter()?;
        }
        Ok(())
    }

    fn drain_reformatter(&mut self) -> Result<()> {
        while let Pull::Ready(mut frame) = self.reformatter.receive()? {
            // Synthetic timeline: gap-free regardless of source timestamps
            let samples = frame.sample_count();
            frame.set_timestamp(self.next_pts);
            self.next_pts += samples as i64;

            self.encoder.submit(frame)?;
            self.stats.frames_encoded += 1;
            self.stats.samples_encoded += samples as u64;
            self.drain_encoder()?;
        }
        Ok(())
    }

    fn drain_encoder(&mut self) -> Result<()> {
        while let Pull::Ready(packet) = self.encoder.receive()? {
            self.sink.write(packet)?;
            self.stats.packets_written += 1;
        }
        Ok(())
    }

    fn record_decoded(&mut self, samples: usize) {
        self.stats.samples_decoded += samples as u64;
        if let (Some(total), Some(progress)) = (self.samples_total, self.progress.as_mut()) {
            progress(ProgressSnapshot {
                samples_decoded: self.stats.samples_decoded,
                samples_total: total,
            });
        }
    }
}
