//! Error types for capture operations.
//!
//! Still encoding, recorder negotiation and the recorder process all report
//! through [`CaptureError`]. None of these are fatal to the session: the
//! controller turns them into a status line and releases what it acquired.

use crate::pipeline::PipelineError;
use crate::stage::StageError;

/// Errors that can occur while capturing a still or a clip
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The host lacks a recorder or a stage capture stream
    #[error("video recording is not supported here ({0})")]
    Unsupported(&'static str),
    /// None of the preferred container/codec pairs can be encoded
    #[error("no supported recording format (tried {tried})")]
    NoSupportedMime { tried: usize },
    /// The recorder could not be constructed
    #[error("cannot start recording: {0}")]
    RecorderStart(String),
    /// The recorder failed mid-recording or while finalizing
    #[error("recorder failed: {0}")]
    Recorder(String),
    /// Encoding the stage as a still image failed
    #[error("failed to encode the stage: {0}")]
    Encode(#[from] StageError),
    /// The recorder produced no data
    #[error("the recording is empty")]
    Empty,
    /// FFmpeg executable not found
    #[error("FFmpeg not found. Please install it with:\n\n    brew install ffmpeg\n")]
    FfmpegNotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for CaptureError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::FfmpegNotFound => CaptureError::FfmpegNotFound,
            PipelineError::Io(io) => CaptureError::Io(io),
            other => CaptureError::Recorder(other.to_string()),
        }
    }
}
