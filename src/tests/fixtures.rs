//! Test fixtures for integration tests
//!
//! Synthesizes WAV inputs with `hound` and inspects MP3 outputs with the
//! crate's own source and decoder stages.

use std::f64::consts::PI;
use std::path::Path;

use crate::transcode::decoder::AudioDecoder;
use crate::transcode::source::SourceReader;
use crate::transcode::stage::{PacketSource, Pull, Stage};

/// Description of a synthesized input
#[derive(Debug, Clone, Copy)]
pub struct SineWav {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Samples per channel
    pub samples: u32,
    pub frequency: f64,
}

impl SineWav {
    /// 16-bit mono 48 kHz, `secs` long
    pub fn mono_48k(secs: f64) -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            bits_per_sample: 16,
            samples: (secs * 48000.0) as u32,
            frequency: 440.0,
        }
    }

    /// 16-bit stereo 44.1 kHz, `secs` long
    pub fn stereo_44k(secs: f64) -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            samples: (secs * 44100.0) as u32,
            frequency: 440.0,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        f64::from(self.samples) / f64::from(self.sample_rate)
    }

    /// Write the tone to `path`. Each channel gets a slightly different pitch.
    pub fn write(&self, path: &Path) {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let peak = f64::from((1i32 << (self.bits_per_sample - 1)) - 1) * 0.5;

        for n in 0..self.samples {
            let t = f64::from(n) / f64::from(self.sample_rate);
            for ch in 0..self.channels {
                let freq = self.frequency * (1.0 + f64::from(ch) * 0.5);
                let value = (2.0 * PI * freq * t).sin() * peak;
                writer.write_sample(value as i32).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
}

/// Write a WAV whose format tag names no codec FFmpeg knows. It probes as
/// an audio stream but cannot be decoded.
pub fn write_unknown_codec_wav(path: &Path) {
    let data = [0u8; 4096];
    let mut bytes = Vec::with_capacity(44 + data.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&0xABCDu16.to_le_bytes()); // format tag
    bytes.extend_from_slice(&1u16.to_le_bytes()); // channels
    bytes.extend_from_slice(&44100u32.to_le_bytes());
    bytes.extend_from_slice(&(44100u32 * 2).to_le_bytes()); // byte rate
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&data);
    std::fs::write(path, bytes).unwrap();
}

/// What a decode pass over an output file found
#[derive(Debug, Clone)]
pub struct DecodedOutput {
    pub codec: String,
    pub channels: u16,
    pub sample_rate: u32,
    /// Samples per channel after decoding
    pub samples: u64,
    pub packets: u64,
    /// Packet pts values, in demux order
    pub packet_pts: Vec<i64>,
}

impl DecodedOutput {
    pub fn duration_secs(&self) -> f64 {
        self.samples as f64 / f64::from(self.sample_rate)
    }

    pub fn pts_strictly_increasing(&self) -> bool {
        self.packet_pts.windows(2).all(|w| w[0] < w[1])
    }
}

/// Demux and fully decode `path`
pub fn decode_output(path: &Path) -> DecodedOutput {
    crate::ffmpeg::init().unwrap();
    let mut source = SourceReader::open(path).unwrap();
    let mut decoder = AudioDecoder::open(&source).unwrap();
    let profile = source.profile().clone();

    let mut samples = 0u64;
    let mut packet_pts = Vec::new();
    let mut drain = |decoder: &mut AudioDecoder| {
        while let Pull::Ready(frame) = decoder.receive().unwrap() {
            samples += frame.samples() as u64;
        }
    };

    while let Pull::Ready(packet) = source.read_next().unwrap() {
        if let Some(pts) = packet.pts() {
            packet_pts.push(pts);
        }
        decoder.submit(packet).unwrap();
        drain(&mut decoder);
    }
    decoder.flush().unwrap();
    drain(&mut decoder);

    DecodedOutput {
        codec: profile.codec_label,
        channels: profile.channel_count,
        sample_rate: profile.sample_rate,
        samples,
        packets: source.packets_read(),
        packet_pts,
    }
}
