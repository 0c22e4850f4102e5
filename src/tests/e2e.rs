//! End-to-end conversion tests

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::config::{ChannelMode, PipelineConfig};
use crate::error::{CastError, ErrorKind, OpenError};
use crate::progress::ProgressSnapshot;
use crate::stats::file_stats;
use crate::tests::fixtures::{decode_output, write_unknown_codec_wav, SineWav};
use crate::transcode::{is_mp3_encoder_available, EncodeSummary, PipelineState, Transcoder};

/// MP3 frame length; the tolerance for tail and duration checks
const FRAME: u64 = 1152;

fn encoder_missing() -> bool {
    crate::ffmpeg::init().unwrap();
    !is_mp3_encoder_available()
}

fn write_input(dir: &Path, name: &str, wav: SineWav) -> PathBuf {
    let path = dir.join(name);
    wav.write(&path);
    path
}

/// Output samples the encoder consumed, at 44.1 kHz
fn encoded_samples(summary: &EncodeSummary) -> u64 {
    (summary.duration_secs * 44100.0).round() as u64
}

fn assert_within_frame(actual: u64, expected: u64, what: &str) {
    assert!(
        actual.abs_diff(expected) <= FRAME,
        "{} {} samples, expected {}",
        what,
        actual,
        expected
    );
}

fn convert(input: &Path, output: &Path, mode: ChannelMode) -> EncodeSummary {
    let config = PipelineConfig::new(input, output, mode).unwrap();
    let mut transcoder = Transcoder::new(config);
    transcoder.initialize().unwrap();
    let summary = transcoder.encode(None).unwrap();
    assert_eq!(transcoder.state(), PipelineState::Completed);
    transcoder.close();
    summary
}

#[test]
fn test_mono_48k_to_default_profile() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "episode.wav", SineWav::mono_48k(27.0));
    let output = dir.path().join("episode.mp3");

    let summary = convert(&input, &output, ChannelMode::Mono);
    assert_eq!(summary.samples_decoded, 27 * 48000);
    assert_within_frame(encoded_samples(&summary), 27 * 44100, "encoded");

    let stats = file_stats(&output).unwrap();
    assert!(
        (26..=28).contains(&stats.duration_secs),
        "duration {}",
        stats.duration_secs
    );
    assert!(stats.size_bytes > 0);

    let decoded = decode_output(&output);
    assert_eq!(decoded.codec, "mp3");
    assert_eq!(decoded.channels, 1);
    assert_eq!(decoded.sample_rate, 44100);
}

#[test]
fn test_stereo_profile() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "stereo.wav", SineWav::stereo_44k(3.0));
    let output = dir.path().join("stereo.mp3");

    convert(&input, &output, ChannelMode::Stereo);

    let decoded = decode_output(&output);
    assert_eq!(decoded.channels, 2);
    assert_eq!(decoded.sample_rate, 44100);
}

#[test]
fn test_stereo_source_downmixed_to_mono() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "stereo.wav", SineWav::stereo_44k(2.0));
    let output = dir.path().join("mono.mp3");

    convert(&input, &output, ChannelMode::Mono);
    assert_eq!(decode_output(&output).channels, 1);
}

#[test]
fn test_24bit_96k_source() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let wav = SineWav {
        sample_rate: 96000,
        channels: 2,
        bits_per_sample: 24,
        samples: 96000 * 2,
        frequency: 1000.0,
    };
    let input = write_input(dir.path(), "studio.wav", wav);
    let output = dir.path().join("studio.mp3");

    let summary = convert(&input, &output, ChannelMode::Mono);
    assert!((summary.duration_secs - 2.0).abs() < 0.05, "{:?}", summary);

    let decoded = decode_output(&output);
    assert_eq!(decoded.channels, 1);
    assert_eq!(decoded.sample_rate, 44100);
}

#[test]
fn test_short_tail_is_encoded() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // 110250 samples: 95 full frames plus an 810 sample tail
    let wav = SineWav::stereo_44k(2.5);
    assert_ne!(u64::from(wav.samples) % FRAME, 0);
    let input = write_input(dir.path(), "tail.wav", wav);
    let output = dir.path().join("tail.mp3");

    let summary = convert(&input, &output, ChannelMode::Stereo);
    let encoded = (summary.duration_secs * 44100.0).round() as i64;
    assert!((encoded - i64::from(wav.samples)).abs() <= 2, "{:?}", summary);

    let decoded = decode_output(&output);
    assert!(
        decoded.samples + FRAME >= u64::from(wav.samples),
        "decoded {} of {} samples",
        decoded.samples,
        wav.samples
    );
}

#[test]
fn test_resampled_tail_is_encoded() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // 120000 samples at 48 kHz resample to 110250: 95 frames plus 810
    let wav = SineWav::mono_48k(2.5);
    let expected = u64::from(wav.samples) * 44100 / 48000;
    assert_ne!(expected % FRAME, 0);
    let input = write_input(dir.path(), "tail48.wav", wav);
    let output = dir.path().join("tail48.mp3");

    let summary = convert(&input, &output, ChannelMode::Mono);
    assert_eq!(summary.samples_decoded, u64::from(wav.samples));
    assert_within_frame(encoded_samples(&summary), expected, "encoded");
    assert_within_frame(decode_output(&output).samples, expected, "decoded");
}

#[test]
fn test_output_timestamps_strictly_increase() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(4.0));
    let output = dir.path().join("out.mp3");

    let summary = convert(&input, &output, ChannelMode::Mono);

    let decoded = decode_output(&output);
    assert!(decoded.packets > 0);
    assert!(decoded.pts_strictly_increasing());
    assert!(decoded.packets <= summary.packets_written);
}

#[test]
fn test_progress_reporting() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(5.0));
    let config =
        PipelineConfig::new(&input, dir.path().join("out.mp3"), ChannelMode::Mono).unwrap();
    let mut transcoder = Transcoder::new(config);
    transcoder.initialize().unwrap();

    let total = transcoder.total_samples().unwrap();
    assert_eq!(total, 5 * 48000);
    assert_eq!(transcoder.input_profile().unwrap().sample_rate, 48000);

    let mut seen: Vec<ProgressSnapshot> = Vec::new();
    let mut on_progress = |snapshot: ProgressSnapshot| seen.push(snapshot);
    transcoder.encode(Some(&mut on_progress)).unwrap();

    assert!(!seen.is_empty());
    assert!(seen.iter().all(|s| s.samples_total == total));
    assert!(seen
        .windows(2)
        .all(|w| w[0].samples_decoded <= w[1].samples_decoded));

    // Final count lands within 1% of the container estimate
    let last = seen.last().unwrap().samples_decoded as f64;
    assert!((last - total as f64).abs() <= total as f64 * 0.01);
}

#[test]
fn test_repeat_runs_match() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(3.0));
    let first = dir.path().join("first.mp3");
    let second = dir.path().join("second.mp3");

    convert(&input, &first, ChannelMode::Mono);
    convert(&input, &second, ChannelMode::Mono);

    let a = decode_output(&first).duration_secs();
    let b = decode_output(&second).duration_secs();
    assert!((a - b).abs() < FRAME as f64 / 44100.0, "{} vs {}", a, b);
    assert_eq!(
        file_stats(&first).unwrap().duration_secs,
        file_stats(&second).unwrap().duration_secs
    );
}

#[test]
fn test_output_extension_does_not_change_container() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(1.0));
    let output = dir.path().join("episode.audio");

    convert(&input, &output, ChannelMode::Mono);
    assert_eq!(decode_output(&output).codec, "mp3");
}

#[test]
fn test_nonexistent_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp3");
    let config =
        PipelineConfig::new(dir.path().join("nope.flac"), &output, ChannelMode::Mono).unwrap();
    let mut transcoder = Transcoder::new(config);

    let err = transcoder.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
    assert!(!output.exists());

    for _ in 0..3 {
        transcoder.close();
    }
    assert_eq!(transcoder.state(), PipelineState::Closed);
}

#[test]
fn test_input_without_audio() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, "Show notes: nothing to hear here.\n").unwrap();
    let config =
        PipelineConfig::new(&input, dir.path().join("out.mp3"), ChannelMode::Mono).unwrap();
    let mut transcoder = Transcoder::new(config);

    let err = transcoder.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
    assert_eq!(transcoder.state(), PipelineState::Failed);
}

#[test]
fn test_missing_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(0.5));
    let config = PipelineConfig::new(
        &input,
        dir.path().join("missing").join("out.mp3"),
        ChannelMode::Mono,
    )
    .unwrap();
    let mut transcoder = Transcoder::new(config);

    let err = transcoder.initialize().unwrap_err();
    assert!(matches!(
        err,
        CastError::Open(OpenError::UnwritableDestination(_))
    ));
}

#[test]
fn test_output_created_tracks_overwritten_file() {
    crate::ffmpeg::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("undecodable.wav");
    write_unknown_codec_wav(&input);
    let output = dir.path().join("episode.mp3");
    std::fs::write(&output, b"last week's episode").unwrap();

    let config = PipelineConfig::new(&input, &output, ChannelMode::Mono).unwrap();
    let mut transcoder = Transcoder::new(config);
    let err = transcoder.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
    transcoder.close();

    // Whatever stage failed, the flag says whether the old file is gone
    let untouched = std::fs::read(&output).unwrap() == b"last week's episode";
    assert_eq!(transcoder.output_created(), !untouched);
}

#[test]
fn test_output_created_after_initialize() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(1.0));
    let output = dir.path().join("out.mp3");
    std::fs::write(&output, b"old").unwrap();
    let config = PipelineConfig::new(&input, &output, ChannelMode::Mono).unwrap();
    let mut transcoder = Transcoder::new(config);
    let token = CancellationToken::new();
    transcoder.set_cancellation(token.clone());

    assert!(!transcoder.output_created());
    transcoder.initialize().unwrap();
    assert!(transcoder.output_created());

    token.cancel();
    assert!(transcoder.encode(None).is_err());
    transcoder.close();
    assert!(transcoder.output_created());
}

#[test]
fn test_empty_output_path_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(0.5));
    let toml = format!("input_path = {:?}\noutput_path = \"\"\n", input);
    let config: PipelineConfig = toml::from_str(&toml).unwrap();
    let mut transcoder = Transcoder::new(config);

    let err = transcoder.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_cancelled_before_encode() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(2.0));
    let config =
        PipelineConfig::new(&input, dir.path().join("out.mp3"), ChannelMode::Mono).unwrap();
    let mut transcoder = Transcoder::new(config);
    let token = CancellationToken::new();
    transcoder.set_cancellation(token.clone());
    transcoder.initialize().unwrap();

    token.cancel();
    let err = transcoder.encode(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(transcoder.state(), PipelineState::Failed);
}

#[test]
fn test_single_use() {
    if encoder_missing() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.wav", SineWav::mono_48k(0.5));
    let config =
        PipelineConfig::new(&input, dir.path().join("out.mp3"), ChannelMode::Mono).unwrap();
    let mut transcoder = Transcoder::new(config);
    transcoder.initialize().unwrap();
    transcoder.encode(None).unwrap();

    let err = transcoder.encode(None).unwrap_err();
    assert!(matches!(
        err,
        CastError::InvalidState {
            operation: "encode",
            state: PipelineState::Completed
        }
    ));
}
