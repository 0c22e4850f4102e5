//! Sink writer: MP3 container output on disk

use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

use crate::error::{OpenError, Result, StreamError};

use super::stage::PacketSink;

/// Muxer name; the output is always MP3 regardless of file extension
pub const OUTPUT_FORMAT: &str = "mp3";

/// Check that `path` can be created before handing it to FFmpeg, so a bad
/// destination is reported as such instead of a generic I/O failure.
pub fn check_destination(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(OpenError::UnwritableDestination(format!(
            "{} is a directory",
            path.display()
        ))
        .into());
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(OpenError::UnwritableDestination(format!(
            "directory {} does not exist",
            parent.display()
        ))
        .into());
    }

    Ok(())
}

/// Output container with a single MP3 stream
pub struct SinkWriter {
    output: ffmpeg::format::context::Output,
    path: PathBuf,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    header_written: bool,
    trailer_written: bool,
    packets_written: u64,
}

impl SinkWriter {
    /// Create the output file and its muxer context.
    ///
    /// The stream is described later by [`SinkWriter::write_header`], once
    /// the encoder is open and its parameters are known.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        check_destination(path)?;

        let output = ffmpeg::format::output_as(&path, OUTPUT_FORMAT)
            .map_err(|e| OpenError::CreateOutput(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "Created output");

        Ok(Self {
            output,
            path: path.to_path_buf(),
            encoder_time_base: ffmpeg::Rational::new(1, 1),
            stream_time_base: ffmpeg::Rational::new(1, 1),
            header_written: false,
            trailer_written: false,
            packets_written: 0,
        })
    }

    /// Add the audio stream from the opened encoder's parameters and write
    /// the container header.
    pub fn write_header(
        &mut self,
        params: ffmpeg::codec::Parameters,
        encoder_time_base: ffmpeg::Rational,
    ) -> Result<()> {
        {
            let mut stream = self
                .output
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::MP3))
                .map_err(|e| {
                    OpenError::WriteHeader(format!("Failed to add audio stream: {}", e))
                })?;
            stream.set_parameters(params);
            stream.set_time_base(encoder_time_base);
        }

        self.output
            .write_header()
            .map_err(|e| OpenError::WriteHeader(format!("{}: {}", self.path.display(), e)))?;

        // The muxer may pick its own stream time base during the header write
        self.stream_time_base = self
            .output
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or(encoder_time_base);
        self.encoder_time_base = encoder_time_base;
        self.header_written = true;

        tracing::debug!(
            time_base = %self.stream_time_base,
            "Wrote output header"
        );

        Ok(())
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }
}

impl PacketSink for SinkWriter {
    type Packet = ffmpeg::Packet;

    fn write(&mut self, mut packet: ffmpeg::Packet) -> Result<()> {
        if !self.header_written {
            return Err(StreamError::WritePacket("header not written".into()).into());
        }

        packet.set_stream(0);
        packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
        packet.set_position(-1);

        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| StreamError::WritePacket(e.to_string()))?;
        self.packets_written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.trailer_written {
            return Ok(());
        }
        self.output
            .write_trailer()
            .map_err(|e| StreamError::WriteTrailer(format!("{}: {}", self.path.display(), e)))?;
        self.trailer_written = true;

        tracing::debug!(packets = self.packets_written, "Wrote output trailer");
        Ok(())
    }
}
