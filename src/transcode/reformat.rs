//! Reformatter: resample, remix and re-chunk decoded audio for the encoder
//!
//! Decoded frames go through an FFmpeg filter graph that converts them to
//! 44.1 kHz planar s16 in the target layout. The graph output is then cut
//! into encoder-sized frames by a [`PlanarChunker`].

use ffmpeg_next as ffmpeg;
use ffmpeg_next::filter;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

use crate::config::{ChannelMode, OutputProfile};
use crate::error::{OpenError, Result, StreamError};
use crate::ffmpeg::helpers;

use super::chunker::PlanarChunker;
use super::decoder::DecodedFormat;
use super::stage::{Pull, Stage};

/// Sample format the MP3 encoder consumes
pub const ENCODER_SAMPLE_FORMAT: Sample = Sample::I16(Type::Planar);

/// Channel layout for an output profile
pub fn target_layout(mode: ChannelMode) -> ChannelLayout {
    match mode {
        ChannelMode::Mono => ChannelLayout::MONO,
        ChannelMode::Stereo => ChannelLayout::STEREO,
    }
}

/// Filter chain between `abuffer` and `abuffersink`.
///
/// `async=1` lets the resampler stretch or squeeze slightly to absorb timing
/// drift instead of dropping samples. A mono target with a multichannel
/// source gets an explicit equal-weight `pan` so no channel dominates.
pub fn filter_spec(source_channels: u16, target: &OutputProfile) -> String {
    let mut chain = vec![format!("aresample={}:async=1", target.sample_rate)];

    if target.mode == ChannelMode::Mono && source_channels > 1 {
        let weight = 1.0 / f64::from(source_channels);
        let terms: Vec<String> = (0..source_channels)
            .map(|c| format!("{:.6}*c{}", weight, c))
            .collect();
        chain.push(format!("pan=mono|c0={}", terms.join("+")));
    }

    chain.push(format!(
        "aformat=sample_fmts={}:sample_rates={}:channel_layouts={}",
        ENCODER_SAMPLE_FORMAT.name(),
        target.sample_rate,
        target.mode.as_str()
    ));

    chain.join(",")
}

/// Argument string for the `abuffer` source describing decoded frames.
pub fn buffer_args(format: &DecodedFormat) -> String {
    // Some demuxers leave the layout unset; fall back on the channel count
    let layout = match (format.channel_layout.bits(), format.channels) {
        (0, 1) => format!("0x{:x}", ChannelLayout::MONO.bits()),
        (0, 2) => format!("0x{:x}", ChannelLayout::STEREO.bits()),
        (0, n) => format!("{}c", n),
        (bits, _) => format!("0x{:x}", bits),
    };

    format!(
        "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout={}",
        format.time_base.numerator(),
        format.time_base.denominator(),
        format.sample_rate,
        format.sample_format.name(),
        layout
    )
}

/// Filter graph plus re-chunker
pub struct Reformatter {
    graph: filter::Graph,
    chunker: PlanarChunker,
    layout: ChannelLayout,
    sample_rate: u32,
    /// Set once the graph sink reports EOF after `flush`
    drained: bool,
    frames_out: u64,
}

impl Reformatter {
    /// Build and validate the graph. `frame_size` is the encoder's required
    /// samples per frame.
    pub fn open(source: &DecodedFormat, target: &OutputProfile, frame_size: usize) -> Result<Self> {
        let mut graph = filter::Graph::new();

        let abuffer = filter::find("abuffer")
            .ok_or_else(|| OpenError::GraphBuild("abuffer filter not available".into()))?;
        let abuffersink = filter::find("abuffersink")
            .ok_or_else(|| OpenError::GraphBuild("abuffersink filter not available".into()))?;

        let args = buffer_args(source);
        graph
            .add(&abuffer, "in", &args)
            .map_err(|e| OpenError::GraphBuild(format!("abuffer ({}): {}", args, e)))?;
        graph
            .add(&abuffersink, "out", "")
            .map_err(|e| OpenError::GraphBuild(format!("abuffersink: {}", e)))?;

        let spec = filter_spec(source.channels, target);
        graph
            .output("in", 0)
            .and_then(|parser| parser.input("out", 0))
            .and_then(|parser| parser.parse(&spec))
            .map_err(|e| OpenError::GraphBuild(format!("{}: {}", spec, e)))?;

        graph
            .validate()
            .map_err(|e| OpenError::GraphBuild(format!("validate: {}", e)))?;

        tracing::debug!(
            graph = %spec,
            source_rate = source.sample_rate,
            source_channels = source.channels,
            frame_size,
            "Reformatter opened"
        );

        Ok(Self {
            graph,
            chunker: PlanarChunker::new(
                usize::from(target.channel_count),
                ENCODER_SAMPLE_FORMAT.bytes(),
                frame_size,
            ),
            layout: target_layout(target.mode),
            sample_rate: target.sample_rate,
            drained: false,
            frames_out: 0,
        })
    }

    pub fn frames_out(&self) -> u64 {
        self.frames_out
    }

    fn build_frame(&mut self, planes: Vec<Vec<u8>>) -> ffmpeg::util::frame::Audio {
        let samples = planes[0].len() / ENCODER_SAMPLE_FORMAT.bytes();
        let mut frame =
            ffmpeg::util::frame::Audio::new(ENCODER_SAMPLE_FORMAT, samples, self.layout);
        frame.set_rate(self.sample_rate);
        for (index, plane) in planes.iter().enumerate() {
            helpers::audio_plane_data_mut(&mut frame, index)[..plane.len()].copy_from_slice(plane);
        }
        self.frames_out += 1;
        frame
    }

    /// Move one filtered frame from the graph sink into the chunker.
    fn pull_filtered(&mut self) -> Result<Pull<()>> {
        let mut filtered = ffmpeg::util::frame::Audio::empty();
        let mut sink = self
            .graph
            .get("out")
            .ok_or_else(|| StreamError::Filter("abuffersink missing from graph".into()))?;

        match sink.sink().frame(&mut filtered) {
            Ok(()) => {
                let len = helpers::plane_len(&filtered);
                let planes: Vec<&[u8]> = (0..self.chunker.plane_count())
                    .map(|i| &helpers::audio_plane_data(&filtered, i)[..len])
                    .collect();
                self.chunker.push(&planes, filtered.samples());
                Ok(Pull::Ready(()))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                Ok(Pull::NeedMoreInput)
            }
            Err(ffmpeg::Error::Eof) => Ok(Pull::EndOfStream),
            Err(e) => Err(StreamError::Filter(e.to_string()).into()),
        }
    }
}

impl Stage for Reformatter {
    type Input = ffmpeg::util::frame::Audio;
    type Output = ffmpeg::util::frame::Audio;

    fn submit(&mut self, frame: ffmpeg::util::frame::Audio) -> Result<()> {
        let mut source = self
            .graph
            .get("in")
            .ok_or_else(|| StreamError::PushFrame("abuffer missing from graph".into()))?;
        source
            .source()
            .add(&frame)
            .map_err(|e| StreamError::PushFrame(e.to_string()).into())
    }

    fn receive(&mut self) -> Result<Pull<ffmpeg::util::frame::Audio>> {
        loop {
            if let Some(planes) = self.chunker.pop_chunk() {
                return Ok(Pull::Ready(self.build_frame(planes)));
            }

            if self.drained {
                // Short tail goes out as its own frame
                return Ok(match self.chunker.take_remainder() {
                    Some(planes) => Pull::Ready(self.build_frame(planes)),
                    None => Pull::EndOfStream,
                });
            }

            match self.pull_filtered()? {
                Pull::Ready(()) => continue,
                Pull::NeedMoreInput => return Ok(Pull::NeedMoreInput),
                Pull::EndOfStream => self.drained = true,
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        let mut source = self
            .graph
            .get("in")
            .ok_or_else(|| StreamError::PushFrame("abuffer missing from graph".into()))?;
        source
            .source()
            .flush()
            .map_err(|e| StreamError::PushFrame(format!("flush: {}", e)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(rate: u32, channels: u16, layout: ChannelLayout) -> DecodedFormat {
        DecodedFormat {
            sample_rate: rate,
            channels,
            channel_layout: layout,
            sample_format: Sample::I32(Type::Packed),
            time_base: ffmpeg::Rational::new(1, rate as i32),
        }
    }

    #[test]
    fn test_filter_spec_mono_from_stereo() {
        let spec = filter_spec(2, &OutputProfile::mono());
        assert_eq!(
            spec,
            "aresample=44100:async=1,\
             pan=mono|c0=0.500000*c0+0.500000*c1,\
             aformat=sample_fmts=s16p:sample_rates=44100:channel_layouts=mono"
        );
    }

    #[test]
    fn test_filter_spec_no_pan_for_mono_source() {
        let spec = filter_spec(1, &OutputProfile::mono());
        assert!(!spec.contains("pan="));
        assert!(spec.ends_with("channel_layouts=mono"));
    }

    #[test]
    fn test_filter_spec_stereo_target() {
        let spec = filter_spec(6, &OutputProfile::stereo());
        assert!(!spec.contains("pan="));
        assert!(spec.ends_with("channel_layouts=stereo"));
    }

    #[test]
    fn test_filter_spec_surround_to_mono_weights() {
        let spec = filter_spec(4, &OutputProfile::mono());
        assert!(spec.contains("c0=0.250000*c0+0.250000*c1+0.250000*c2+0.250000*c3"));
    }

    #[test]
    fn test_buffer_args() {
        crate::ffmpeg::init().unwrap();
        let args = buffer_args(&format(48000, 2, ChannelLayout::STEREO));
        assert_eq!(
            args,
            "time_base=1/48000:sample_rate=48000:sample_fmt=s32:channel_layout=0x3"
        );
    }

    #[test]
    fn test_buffer_args_missing_layout() {
        crate::ffmpeg::init().unwrap();
        let args = buffer_args(&format(44100, 1, ChannelLayout::empty()));
        assert!(args.ends_with("channel_layout=0x4"), "{}", args);
        let args = buffer_args(&format(44100, 6, ChannelLayout::empty()));
        assert!(args.ends_with("channel_layout=6c"), "{}", args);
    }

    #[test]
    fn test_reformat_emits_full_frames_then_short_tail() {
        crate::ffmpeg::init().unwrap();
        let source = DecodedFormat {
            sample_rate: 44100,
            channels: 1,
            channel_layout: ChannelLayout::MONO,
            sample_format: Sample::I16(Type::Packed),
            time_base: ffmpeg::Rational::new(1, 44100),
        };
        let mut reformatter = Reformatter::open(&source, &OutputProfile::mono(), 1152).unwrap();

        let total = 1152 * 3 + 500;
        let mut frame =
            ffmpeg::util::frame::Audio::new(Sample::I16(Type::Packed), total, ChannelLayout::MONO);
        frame.set_rate(44100);
        frame.set_pts(Some(0));
        for b in helpers::audio_plane_data_mut(&mut frame, 0).iter_mut() {
            *b = 0;
        }

        let mut sizes = Vec::new();
        reformatter.submit(frame).unwrap();
        while let Pull::Ready(out) = reformatter.receive().unwrap() {
            sizes.push(out.samples());
        }
        reformatter.flush().unwrap();
        loop {
            match reformatter.receive().unwrap() {
                Pull::Ready(out) => sizes.push(out.samples()),
                Pull::EndOfStream => break,
                Pull::NeedMoreInput => panic!("flushed reformatter asked for input"),
            }
        }

        let (last, full) = sizes.split_last().unwrap();
        assert!(full.iter().all(|&n| n == 1152), "{:?}", sizes);
        assert!(*last > 0 && *last <= 1152);
        assert_eq!(sizes.iter().sum::<usize>(), total);
    }
}
