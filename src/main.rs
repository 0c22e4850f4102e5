//! castdrop
//!
//! Encodes a lossless or uncompressed podcast recording into a
//! constant-bitrate MP3 and prints its duration and size for the show notes.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use castdrop::config_file::{ConfigFile, LogFormat};
use castdrop::progress::{format_eta, progress_channel, ProgressReporter, ProgressStats};
use castdrop::transcode::describe_channels;
use castdrop::{
    file_stats, ChannelMode, EncodeSummary, ErrorKind, PipelineConfig, ProgressSnapshot, Result,
    Transcoder,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "castdrop";

/// Podcast encoder command line
#[derive(Parser, Debug, Clone)]
#[command(name = "castdrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input audio file (FLAC, WAV, ...)
    input: PathBuf,

    /// Output MP3 file
    output: PathBuf,

    /// Encode 192 kbps stereo instead of 112 kbps mono
    #[arg(long)]
    stereo: bool,

    /// Settings file
    #[arg(short = 'c', long, default_value = "castdrop.toml")]
    config: PathBuf,

    /// Log output format; overrides the settings file
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = load_settings(&cli.config);
    init_logging(
        &settings.logging.level,
        cli.log_format.unwrap_or(settings.logging.format),
    );

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::debug!("FFmpeg version: {}", castdrop::ffmpeg::version_info());

    if let Err(e) = run(cli, settings).await {
        tracing::error!("{}", e);
        let code = match e.kind() {
            ErrorKind::Cancelled => 130,
            ErrorKind::Configuration => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli, settings: ConfigFile) -> Result<()> {
    castdrop::ffmpeg::init()?;
    castdrop::ffmpeg::install_log_filter();

    let mode = if cli.stereo {
        ChannelMode::Stereo
    } else {
        settings.channel_mode()
    };
    let config = PipelineConfig::new(&cli.input, &cli.output, mode)?;
    let output = cli.output.clone();
    let output_preexisting = output.exists();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping encoder");
            ctrl_c.cancel();
        }
    });

    let (mut reporter, mut updates) = progress_channel(settings.progress.channel_capacity);
    let log_every = f64::from(settings.progress.log_every_percent.max(1));

    // FFmpeg contexts are not Send; the transcoder lives entirely on the
    // blocking thread
    let started = Instant::now();
    let encode = tokio::task::spawn_blocking(move || {
        let mut transcoder = Transcoder::new(config);
        transcoder.set_cancellation(cancel);
        let result = encode_file(&mut transcoder, &mut reporter);
        (result, transcoder.output_created())
    });

    let watcher = tokio::spawn(async move {
        let mut stats = ProgressStats::new(0);
        let mut next_mark = log_every;
        while let Some(snapshot) = updates.recv().await {
            stats.update(snapshot);
            if stats.percent() >= next_mark {
                tracing::info!(
                    "{:.0}% (eta {})",
                    stats.percent(),
                    format_eta(stats.time_remaining())
                );
                next_mark += log_every;
            }
        }
    });

    let (result, output_created) = match encode.await {
        Ok((result, created)) => (result, Some(created)),
        Err(e) => (
            Err(std::io::Error::new(std::io::ErrorKind::Other, e).into()),
            None,
        ),
    };
    if let Err(e) = watcher.await {
        tracing::warn!("Progress watcher failed: {}", e);
    }

    let (summary, input_rate) = match result {
        Ok(done) => done,
        Err(e) => {
            if should_remove_output(output_created, output_preexisting) {
                remove_partial_output(&output);
            }
            return Err(e);
        }
    };

    let mut speed = ProgressStats::new(input_rate);
    speed.update(ProgressSnapshot {
        samples_decoded: summary.samples_decoded,
        samples_total: summary.samples_decoded,
    });
    tracing::info!(
        "Encoded {:.1}s of audio at {:.1}x realtime",
        summary.duration_secs,
        speed.speed_over(started.elapsed())
    );

    let stats = file_stats(&output)?;
    println!("Output:   {}", output.display());
    println!("Duration: {} ({}s)", stats.duration_hms, stats.duration_secs);
    println!("Size:     {} bytes", stats.size_bytes);

    Ok(())
}

/// Initialize the pipeline and run the encode, logging what it works on.
/// Returns the summary and the input sample rate.
fn encode_file(
    transcoder: &mut Transcoder,
    reporter: &mut ProgressReporter,
) -> Result<(EncodeSummary, u32)> {
    transcoder.initialize()?;

    let input_rate = match transcoder.input_profile() {
        Some(profile) => {
            tracing::info!(
                "Input: {} ({} {}Hz)",
                profile.codec_label,
                describe_channels(profile.channel_count),
                profile.sample_rate
            );
            profile.sample_rate
        }
        None => 0,
    };
    tracing::info!("Output: {}", transcoder.output_profile().describe());
    if transcoder.total_samples().is_none() {
        tracing::warn!("Input duration unknown, progress will not be reported");
    }

    let mut on_progress = |snapshot: ProgressSnapshot| {
        reporter.report(snapshot);
    };
    let summary = transcoder.encode(Some(&mut on_progress))?;
    if reporter.dropped() > 0 {
        tracing::debug!(dropped = reporter.dropped(), "Progress updates dropped");
    }
    Ok((summary, input_rate))
}

/// Whether a failed run has to delete the output path: always once the
/// pipeline created the file. When that is unknown (the encode task
/// panicked), a file that was there before the run is left alone.
fn should_remove_output(output_created: Option<bool>, output_preexisting: bool) -> bool {
    output_created.unwrap_or(!output_preexisting)
}

/// Load the settings file, falling back to defaults when it is missing or
/// broken. Runs before logging is up, so problems go to stderr.
fn load_settings(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default_config();
    }
    match ConfigFile::from_file(path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Failed to load config file {}: {}. Using defaults.",
                path.display(),
                e
            );
            ConfigFile::default_config()
        }
    }
}

/// Delete a truncated output file after a failed or cancelled encode
fn remove_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

/// Initialize logging with tracing
fn init_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("castdrop={},ffmpeg={}", level, level).into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
