use thiserror::Error;

use crate::transcode::PipelineState;

/// Main error type for the podcast encoder
#[derive(Error, Debug)]
pub enum CastError {
    /// Invalid or missing configuration, raised before any resource is opened
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure while opening one of the pipeline stages
    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    /// Failure in the middle of the decode/reformat/encode loop
    #[error("Mid-stream error: {0}")]
    Stream(#[from] StreamError),

    /// An operation was called in a pipeline state that does not allow it
    #[error("Cannot {operation} while pipeline is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    /// The encode loop observed a cancellation request
    #[error("Encoding cancelled")]
    Cancelled,

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while initializing the pipeline
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("FFmpeg initialization failed: {0}")]
    Init(String),

    #[error("Input file not found: {0}")]
    NotFound(String),

    #[error("Input file unreadable: {0}")]
    Unreadable(String),

    #[error("Cannot probe input: {0}")]
    Unprobeable(String),

    #[error("No audio stream in input: {0}")]
    NoAudioStream(String),

    #[error("Unsupported input codec: {0}")]
    UnsupportedCodec(String),

    #[error("Failed to open decoder: {0}")]
    DecoderOpen(String),

    #[error("MP3 encoder not available: {0}")]
    EncoderUnavailable(String),

    #[error("Failed to open encoder: {0}")]
    EncoderOpen(String),

    #[error("Failed to build filter graph: {0}")]
    GraphBuild(String),

    #[error("Failed to create output: {0}")]
    CreateOutput(String),

    #[error("Output destination not writable: {0}")]
    UnwritableDestination(String),

    #[error("Failed to write header: {0}")]
    WriteHeader(String),
}

/// Errors raised while the stream is flowing
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to read packet: {0}")]
    ReadFailure(String),

    #[error("Failed to submit packet to decoder: {0}")]
    SubmitPacket(String),

    #[error("Failed to decode: {0}")]
    Decode(String),

    #[error("Failed to push frame into filter graph: {0}")]
    PushFrame(String),

    #[error("Failed to pull frame from filter graph: {0}")]
    Filter(String),

    #[error("Failed to submit frame to encoder: {0}")]
    SubmitFrame(String),

    #[error("Failed to encode: {0}")]
    Encode(String),

    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),
}

/// Coarse error category, one per branch of the error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Open,
    MidStream,
    Lifecycle,
    Cancelled,
    Io,
}

impl CastError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CastError::Config(_) => ErrorKind::Configuration,
            CastError::Open(_) => ErrorKind::Open,
            CastError::Stream(_) => ErrorKind::MidStream,
            CastError::InvalidState { .. } => ErrorKind::Lifecycle,
            CastError::Cancelled => ErrorKind::Cancelled,
            CastError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CastError>;
