//! Audio decoder for the transcoding pipeline
//!
//! Wraps an FFmpeg `AVCodecContext` to decode compressed or raw audio packets
//! (FLAC, WAV/PCM, ALAC, …) into PCM `AVFrame`s in the codec's native sample
//! format. Rate, layout and frame size are left untouched; that is the
//! reformatter's job.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::error::{OpenError, Result, StreamError};

use super::source::SourceReader;
use super::stage::{Pull, Stage};

/// Format of the frames the decoder produces
#[derive(Debug, Clone, Copy)]
pub struct DecodedFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub channel_layout: ChannelLayout,
    pub sample_format: Sample,
    /// Time base of frame timestamps (the source stream's time base)
    pub time_base: ffmpeg::Rational,
}

/// Audio decoder backed by a FFmpeg codec context
pub struct AudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    time_base: ffmpeg::Rational,
    frames_decoded: u64,
}

impl AudioDecoder {
    /// Open a decoder for the source's selected stream.
    ///
    /// Uses the stream's own codec parameters to initialise the context so no
    /// external configuration is needed.
    pub fn open(source: &SourceReader) -> Result<Self> {
        let params = source.parameters().ok_or_else(|| {
            OpenError::DecoderOpen(format!(
                "stream {} disappeared from source",
                source.stream_index()
            ))
        })?;

        let codec_id = params.id();
        if ffmpeg::codec::decoder::find(codec_id).is_none() {
            return Err(OpenError::UnsupportedCodec(codec_id.name().to_string()).into());
        }

        let context = ffmpeg::codec::Context::from_parameters(params).map_err(|e| {
            OpenError::DecoderOpen(format!(
                "Failed to create codec context for {}: {}",
                codec_id.name(),
                e
            ))
        })?;

        let decoder = context.decoder().audio().map_err(|e| {
            OpenError::DecoderOpen(format!(
                "Failed to open {} decoder: {}",
                codec_id.name(),
                e
            ))
        })?;

        tracing::debug!(
            codec = codec_id.name(),
            rate = decoder.rate(),
            channels = decoder.channels(),
            format = ?decoder.format(),
            "Decoder opened"
        );

        Ok(Self {
            decoder,
            time_base: source.time_base(),
            frames_decoded: 0,
        })
    }

    /// Format of decoded frames, used to configure the reformatter.
    pub fn decoded_format(&self) -> DecodedFormat {
        DecodedFormat {
            sample_rate: self.decoder.rate(),
            channels: self.decoder.channels(),
            channel_layout: self.decoder.channel_layout(),
            sample_format: self.decoder.format(),
            time_base: self.time_base,
        }
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl Stage for AudioDecoder {
    type Input = ffmpeg::Packet;
    type Output = ffmpeg::util::frame::Audio;

    fn submit(&mut self, packet: ffmpeg::Packet) -> Result<()> {
        self.decoder
            .send_packet(&packet)
            .map_err(|e| StreamError::SubmitPacket(e.to_string()).into())
    }

    fn receive(&mut self) -> Result<Pull<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => {
                self.frames_decoded += 1;
                // Keep the reformatter's async resampler on the best-effort
                // timeline rather than raw packet pts
                let ts = frame.timestamp();
                frame.set_pts(ts);
                Ok(Pull::Ready(frame))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(Pull::NeedMoreInput)
            }
            Err(ffmpeg::Error::Eof) => Ok(Pull::EndOfStream),
            Err(e) => Err(StreamError::Decode(e.to_string()).into()),
        }
    }

    /// Send EOF so the decoder releases its internally buffered frames.
    ///
    /// EAGAIN and EOF responses are ignored: the decoder has nothing buffered
    /// or is already finished.
    fn flush(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(()),
            Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(StreamError::Decode(format!("send_eof: {}", e)).into()),
        }
    }
}
