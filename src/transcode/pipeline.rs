//! Transcode pipeline: owns every stage and drives one conversion
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──encode──▶ Running ──▶ Flushing ──▶ Completed
//!        │                           │                     │           │
//!        └────────── any error ──────┴─────────────────────┴───────────┴──▶ Failed
//!
//! Uninitialized | Initialized | Completed | Failed ──close──▶ Closed
//! ```
//!
//! Stages are acquired in dependency order and released in reverse by
//! [`Transcoder::close`], which also runs on drop. A failed run leaves the
//! partial output on disk; deleting it is up to the caller, and
//! [`Transcoder::output_created`] tells whether there is anything to delete.

use tokio_util::sync::CancellationToken;

use crate::config::{OutputProfile, PipelineConfig};
use crate::error::{CastError, Result};
use crate::progress::ProgressSnapshot;

use super::decoder::AudioDecoder;
use super::driver::Driver;
use super::encoder::Mp3Encoder;
use super::reformat::Reformatter;
use super::sink::SinkWriter;
use super::source::{SourceReader, StreamProfile};

/// Lifecycle of a [`Transcoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    Running,
    Flushing,
    Completed,
    Failed,
    Closed,
}

/// Result of a completed encode
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSummary {
    /// Samples per channel decoded at the source rate
    pub samples_decoded: u64,
    pub frames_encoded: u64,
    pub packets_written: u64,
    /// Encoded audio length at the output rate
    pub duration_secs: f64,
}

/// Single-use lossless-to-MP3 converter
pub struct Transcoder {
    config: PipelineConfig,
    state: PipelineState,
    cancel: Option<CancellationToken>,
    source: Option<SourceReader>,
    sink: Option<SinkWriter>,
    decoder: Option<AudioDecoder>,
    encoder: Option<Mp3Encoder>,
    reformatter: Option<Reformatter>,
    input_profile: Option<StreamProfile>,
    total_samples: Option<u64>,
    output_created: bool,
}

impl Transcoder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: PipelineState::Uninitialized,
            cancel: None,
            source: None,
            sink: None,
            decoder: None,
            encoder: None,
            reformatter: None,
            input_profile: None,
            total_samples: None,
            output_created: false,
        }
    }

    /// Abort `encode` with [`CastError::Cancelled`] once `token` is cancelled.
    /// Checked once per source packet and between flush phases.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Probed input format; `None` before `initialize`
    pub fn input_profile(&self) -> Option<&StreamProfile> {
        self.input_profile.as_ref()
    }

    pub fn output_profile(&self) -> &OutputProfile {
        self.config.output_profile()
    }

    /// Whether the output file was created (or truncated) by this pipeline.
    /// Stays set after a failure and after `close`.
    pub fn output_created(&self) -> bool {
        self.output_created
    }

    /// Estimated input length in samples at the source rate; `None` when the
    /// container does not report a duration
    pub fn total_samples(&self) -> Option<u64> {
        self.total_samples
    }

    /// Open every stage. On failure, whatever was opened is released again
    /// and the pipeline moves to `Failed`.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != PipelineState::Uninitialized {
            return Err(CastError::InvalidState {
                operation: "initialize",
                state: self.state,
            });
        }

        match self.open_stages() {
            Ok(()) => {
                self.state = PipelineState::Initialized;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Initialization failed, releasing stages");
                self.release();
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    fn open_stages(&mut self) -> Result<()> {
        // Nothing may touch the filesystem before the paths are checked
        self.config.validate()?;
        crate::ffmpeg::init()?;

        let source = self.source.insert(SourceReader::open(self.config.input_path())?);
        self.input_profile = Some(source.profile().clone());
        self.total_samples = source.estimated_total_samples();

        let sink = self.sink.insert(SinkWriter::open(self.config.output_path())?);
        self.output_created = true;

        let decoder = AudioDecoder::open(source)?;
        let decoded = decoder.decoded_format();
        self.decoder = Some(decoder);

        let profile = *self.config.output_profile();
        let encoder = self.encoder.insert(Mp3Encoder::open(&profile)?);
        sink.write_header(encoder.codec_parameters(), encoder.time_base())?;

        self.reformatter = Some(Reformatter::open(&decoded, &profile, encoder.frame_size())?);

        tracing::info!(
            input = %self.config.input_path().display(),
            output = %self.config.output_path().display(),
            source = %self.input_profile.as_ref().map(|p| p.describe()).unwrap_or_default(),
            target = %profile.describe(),
            "Pipeline initialized"
        );
        Ok(())
    }

    /// Run the conversion to completion. Blocks the calling thread.
    ///
    /// `progress` is called after every decoded frame when the total length
    /// is known; it must return quickly.
    pub fn encode(
        &mut self,
        progress: Option<&mut dyn FnMut(ProgressSnapshot)>,
    ) -> Result<EncodeSummary> {
        if self.state != PipelineState::Initialized {
            return Err(CastError::InvalidState {
                operation: "encode",
                state: self.state,
            });
        }

        self.state = PipelineState::Running;
        match self.run(progress) {
            Ok(summary) => {
                self.state = PipelineState::Completed;
                tracing::info!(
                    duration_secs = summary.duration_secs,
                    packets = summary.packets_written,
                    "Encoding complete"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    fn run(&mut self, progress: Option<&mut dyn FnMut(ProgressSnapshot)>) -> Result<EncodeSummary> {
        let (Some(source), Some(decoder), Some(reformatter), Some(encoder), Some(sink)) = (
            self.source.as_mut(),
            self.decoder.as_mut(),
            self.reformatter.as_mut(),
            self.encoder.as_mut(),
            self.sink.as_mut(),
        ) else {
            return Err(CastError::InvalidState {
                operation: "encode",
                state: self.state,
            });
        };

        let mut driver = Driver::new(source, decoder, reformatter, encoder, sink)
            .with_total(self.total_samples)
            .with_cancellation(self.cancel.as_ref());
        if let Some(progress) = progress {
            driver = driver.with_progress(progress);
        }

        driver.pump()?;
        self.state = PipelineState::Flushing;
        driver.flush()?;
        let stats = driver.finish()?;
        drop(driver);

        tracing::debug!(
            packets_read = self.source.as_ref().map_or(0, |s| s.packets_read()),
            frames_decoded = self.decoder.as_ref().map_or(0, |d| d.frames_decoded()),
            frames_reformatted = self.reformatter.as_ref().map_or(0, |r| r.frames_out()),
            packets_encoded = self.encoder.as_ref().map_or(0, |e| e.packets_out()),
            packets_written = self.sink.as_ref().map_or(0, |s| s.packets_written()),
            "Stage counters"
        );

        Ok(EncodeSummary {
            samples_decoded: stats.samples_decoded,
            frames_encoded: stats.frames_encoded,
            packets_written: stats.packets_written,
            duration_secs: stats.samples_encoded as f64
                / f64::from(self.config.output_profile().sample_rate),
        })
    }

    /// Release every stage in reverse acquisition order. Safe to call any
    /// number of times, in any state.
    pub fn close(&mut self) {
        if self.state == PipelineState::Closed {
            return;
        }
        self.release();
        self.state = PipelineState::Closed;
    }

    fn release(&mut self) {
        drop(self.reformatter.take());
        drop(self.encoder.take());
        drop(self.decoder.take());
        drop(self.sink.take());
        drop(self.source.take());
    }
}

impl Drop for Transcoder {
    fn drop(&mut self) {
        self.close();
    }
}
