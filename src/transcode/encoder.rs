//! MP3 encoder for the transcoding pipeline
//!
//! Wraps an FFmpeg `AVCodecContext` around libmp3lame to encode planar s16
//! frames at 44.1 kHz into constant-bitrate MP3 packets.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;

use crate::config::OutputProfile;
use crate::error::{OpenError, Result, StreamError};
use crate::ffmpeg::helpers;

use super::reformat::{target_layout, ENCODER_SAMPLE_FORMAT};
use super::stage::{Pull, Stage};

/// MPEG-1 Layer III samples per channel per frame
pub const MP3_FRAME_SIZE: usize = 1152;

/// MP3 encoder backed by a real FFmpeg codec context
pub struct Mp3Encoder {
    encoder: ffmpeg::encoder::Audio,
    frame_size: usize,
    time_base: ffmpeg::Rational,
    /// Timestamp of the next packet; `None` until the first one arrives
    next_pts: Option<i64>,
    packets_out: u64,
}

impl Mp3Encoder {
    /// Open an MP3 encoder for the given output profile.
    ///
    /// Bitrate is constant; `quality_level` and `lowpass_hz` are passed to
    /// LAME as `compression_level` and `cutoff`.
    pub fn open(profile: &OutputProfile) -> Result<Self> {
        let codec = codec::encoder::find(codec::Id::MP3).ok_or_else(|| {
            OpenError::EncoderUnavailable("no MP3 encoder in this FFmpeg build".into())
        })?;

        let time_base = ffmpeg::Rational::new(1, profile.sample_rate as i32);

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(time_base);

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            OpenError::EncoderOpen(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(profile.sample_rate as i32);
        audio_enc.set_format(ENCODER_SAMPLE_FORMAT);
        audio_enc.set_channel_layout(target_layout(profile.mode));
        audio_enc.set_bit_rate(profile.bitrate_bps as usize);

        let mut options = ffmpeg::Dictionary::new();
        options.set("compression_level", &profile.quality_level.to_string());
        options.set("cutoff", &profile.lowpass_hz.to_string());

        let encoder = audio_enc.open_as_with(codec, options).map_err(|e| {
            OpenError::EncoderOpen(format!(
                "Failed to open MP3 encoder ({}): {}",
                profile.describe(),
                e
            ))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => MP3_FRAME_SIZE,
            n => n,
        };

        tracing::debug!(
            profile = %profile.describe(),
            frame_size,
            "MP3 encoder opened"
        );

        Ok(Self {
            encoder,
            frame_size,
            time_base,
            next_pts: None,
            packets_out: 0,
        })
    }

    /// The number of samples per channel the encoder expects per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// The encoder time base (1 / sample_rate).
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Codec parameters for the muxer's output stream.
    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        helpers::encoder_codec_parameters(&self.encoder)
    }

    pub fn packets_out(&self) -> u64 {
        self.packets_out
    }
}

impl Stage for Mp3Encoder {
    type Input = ffmpeg::util::frame::Audio;
    type Output = ffmpeg::Packet;

    fn submit(&mut self, frame: ffmpeg::util::frame::Audio) -> Result<()> {
        self.encoder
            .send_frame(&frame)
            .map_err(|e| StreamError::SubmitFrame(e.to_string()).into())
    }

    fn receive(&mut self) -> Result<Pull<ffmpeg::Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => {
                // LAME's delay packets after the last input carry no usable
                // duration and drifting pts, so every packet is restamped
                // one duration after the previous one
                let duration = match packet.duration() {
                    d if d > 0 => d,
                    _ => self.frame_size as i64,
                };
                let pts = match self.next_pts {
                    Some(pts) => pts,
                    None => packet.pts().unwrap_or(0),
                };
                packet.set_pts(Some(pts));
                packet.set_dts(Some(pts));
                packet.set_duration(duration);
                self.next_pts = Some(pts + duration);
                self.packets_out += 1;
                Ok(Pull::Ready(packet))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(Pull::NeedMoreInput)
            }
            Err(ffmpeg::Error::Eof) => Ok(Pull::EndOfStream),
            Err(e) => Err(StreamError::Encode(e.to_string()).into()),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self.encoder.send_eof() {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(StreamError::Encode(format!("send_eof: {}", e)).into()),
        }
    }
}

/// Check whether the FFmpeg build includes an MP3 encoder.
pub fn is_mp3_encoder_available() -> bool {
    codec::encoder::find(codec::Id::MP3).is_some()
}
