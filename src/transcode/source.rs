//! Source reader: opens the input container and yields packets of its first
//! audio stream.

use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

use crate::error::{OpenError, Result, StreamError};
use crate::ffmpeg::helpers;

use super::stage::{PacketSource, Pull};

/// Native format of the selected input stream, as probed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProfile {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub codec_label: String,
}

impl StreamProfile {
    /// e.g. "flac 48000Hz stereo"
    pub fn describe(&self) -> String {
        format!(
            "{} {}Hz {}",
            self.codec_label,
            self.sample_rate,
            describe_channels(self.channel_count)
        )
    }
}

/// Format a channel count as "mono", "stereo" or "Nch"
pub fn describe_channels(channels: u16) -> String {
    match channels {
        1 => "mono".to_string(),
        2 => "stereo".to_string(),
        n => format!("{}ch", n),
    }
}

/// Sample count implied by a duration at the given rate; `None` when the
/// duration is unknown or non-positive.
pub fn estimate_total_samples(duration_secs: Option<f64>, sample_rate: u32) -> Option<u64> {
    match duration_secs {
        Some(secs) if secs > 0.0 && sample_rate > 0 => {
            Some((secs * f64::from(sample_rate)) as u64)
        }
        _ => None,
    }
}

/// Demuxer for the input file, restricted to one audio stream
pub struct SourceReader {
    input: ffmpeg::format::context::Input,
    path: PathBuf,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    profile: StreamProfile,
    duration_secs: Option<f64>,
    packets_read: u64,
    packets_discarded: u64,
}

impl SourceReader {
    /// Open and probe `path`, selecting the first audio stream in container
    /// order.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        match std::fs::metadata(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OpenError::NotFound(path.display().to_string()).into());
            }
            Err(e) => {
                return Err(OpenError::Unreadable(format!("{}: {}", path.display(), e)).into());
            }
            Ok(meta) if meta.is_dir() => {
                return Err(
                    OpenError::Unreadable(format!("{} is a directory", path.display())).into(),
                );
            }
            Ok(_) => {}
        }

        // `format::input` opens the container and runs the probe pass
        let input = ffmpeg::format::input(&path).map_err(|e| match e {
            ffmpeg::Error::InvalidData | ffmpeg::Error::StreamNotFound => {
                OpenError::Unprobeable(format!("{}: {}", path.display(), e))
            }
            _ => OpenError::Unreadable(format!("{}: {}", path.display(), e)),
        })?;

        let stream = input
            .streams()
            .find(|s| s.parameters().medium() == ffmpeg::media::Type::Audio)
            .ok_or_else(|| OpenError::NoAudioStream(path.display().to_string()))?;

        let params = stream.parameters();
        let profile = StreamProfile {
            sample_rate: helpers::codec_params_sample_rate(&params),
            channel_count: helpers::codec_params_channels(&params),
            codec_label: params.id().name().to_string(),
        };
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let stream_duration = stream.duration();
        let duration_secs = if stream_duration > 0 && time_base.denominator() != 0 {
            Some(stream_duration as f64 * f64::from(time_base))
        } else if input.duration() > 0 {
            Some(input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE))
        } else {
            None
        };

        tracing::debug!(
            path = %path.display(),
            stream_index,
            codec = %profile.codec_label,
            sample_rate = profile.sample_rate,
            channels = profile.channel_count,
            duration_secs = ?duration_secs,
            "Opened source"
        );

        Ok(Self {
            input,
            path: path.to_path_buf(),
            stream_index,
            time_base,
            profile,
            duration_secs,
            packets_read: 0,
            packets_discarded: 0,
        })
    }

    pub fn profile(&self) -> &StreamProfile {
        &self.profile
    }

    /// Index of the selected stream in the container
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Time base of the selected stream
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Container-reported duration in seconds, if any
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Estimated number of samples per channel at the native rate
    pub fn estimated_total_samples(&self) -> Option<u64> {
        estimate_total_samples(self.duration_secs, self.profile.sample_rate)
    }

    /// Codec parameters of the selected stream
    pub fn parameters(&self) -> Option<ffmpeg::codec::Parameters> {
        self.input
            .stream(self.stream_index)
            .map(|stream| stream.parameters())
    }

    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }
}

impl PacketSource for SourceReader {
    type Packet = ffmpeg::Packet;

    fn read_next(&mut self) -> Result<Pull<ffmpeg::Packet>> {
        loop {
            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        self.packets_discarded += 1;
                        continue;
                    }
                    self.packets_read += 1;
                    return Ok(Pull::Ready(packet));
                }
                Err(ffmpeg::Error::Eof) => {
                    tracing::debug!(
                        packets = self.packets_read,
                        discarded = self.packets_discarded,
                        "Source reached end of stream"
                    );
                    return Ok(Pull::EndOfStream);
                }
                Err(e) => {
                    return Err(StreamError::ReadFailure(format!(
                        "{}: {}",
                        self.path.display(),
                        e
                    ))
                    .into());
                }
            }
        }
    }
}
