//! FFmpeg module - library setup and safe wrappers around raw FFI access
//!
//! This module handles:
//! - FFmpeg initialization
//! - Routing native log output into `tracing`
//! - Field accessors `ffmpeg-next` does not expose (see [`helpers`])

pub mod helpers;

pub use ffmpeg_next as ffmpeg;

use std::sync::Once;

use crate::error::OpenError;

static LOG_FILTER: Once = Once::new();

/// Initialize the FFmpeg library.
///
/// Safe to call more than once; every pipeline and test calls it before
/// touching any other FFmpeg API.
pub fn init() -> Result<(), OpenError> {
    ffmpeg::init().map_err(|e| OpenError::Init(format!("ffmpeg::init() failed: {}", e)))?;

    tracing::debug!("FFmpeg initialized");

    Ok(())
}

/// Install a custom FFmpeg log callback that forwards native messages to
/// `tracing` and drops known-benign ones.
///
/// The native log level is lowered to errors so per-packet demuxer and
/// encoder chatter never reaches the terminal. Only the first call has any
/// effect.
pub fn install_log_filter() {
    LOG_FILTER.call_once(|| {
        // SAFETY: both functions modify global FFmpeg state. `Once` guarantees
        // a single call, made before any pipeline starts on another thread.
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR as i32);
            ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
        }
    });
}

/// Messages that are expected for podcast inputs and should be suppressed.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Estimating duration from bitrate",
    "Could not update timestamps for skipped samples",
    "Queue input is backward in time",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    // Respect the configured log level
    if level > unsafe { ffmpeg_next::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();

    if msg.is_empty() || SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg_next::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    }
}

/// Get the version information of the linked libavcodec.
pub fn version_info() -> String {
    // SAFETY: `avcodec_version` only reads a compile-time constant.
    let version = unsafe { ffmpeg_next::ffi::avcodec_version() };
    format!(
        "libavcodec {}.{}.{}",
        version >> 16,
        (version >> 8) & 0xff,
        version & 0xff
    )
}
