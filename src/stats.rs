//! Statistics of a finished MP3, for show notes and feed metadata

use ffmpeg_next as ffmpeg;
use std::path::Path;

use crate::error::{OpenError, Result};

/// Duration and size of an encoded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// Whole seconds, truncated
    pub duration_secs: u64,
    /// `HH:MM:SS`
    pub duration_hms: String,
    pub size_bytes: u64,
}

/// Probe `path` for its container duration and read its size
pub fn file_stats<P: AsRef<Path>>(path: P) -> Result<FileStats> {
    let path = path.as_ref();
    let size_bytes = std::fs::metadata(path)?.len();

    let input = ffmpeg::format::input(&path)
        .map_err(|e| OpenError::Unprobeable(format!("{}: {}", path.display(), e)))?;

    let duration = input.duration();
    if duration <= 0 {
        return Err(OpenError::Unprobeable(format!(
            "{} reports no duration ({})",
            path.display(),
            duration
        ))
        .into());
    }
    let duration_secs = (duration / i64::from(ffmpeg::ffi::AV_TIME_BASE)) as u64;

    Ok(FileStats {
        duration_secs,
        duration_hms: format_duration_hms(duration_secs),
        size_bytes,
    })
}

/// Render whole seconds as `HH:MM:SS`; hours are not wrapped
pub fn format_duration_hms(secs: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}
