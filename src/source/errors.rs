//! Error types for device acquisition and media decoding.

/// Errors raised while acquiring devices or decoding imported media.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The platform offers no way to reach this kind of device
    #[error("{0} capture is not supported here")]
    Unsupported(&'static str),

    /// Capture requires a secure context
    #[error("camera access requires a secure context")]
    InsecureContext,

    /// The user or the OS refused access
    #[error("permission denied for {0}")]
    PermissionDenied(String),

    /// The device exists but could not be opened
    #[error("device '{device}' could not be opened: {message}")]
    DeviceFailed { device: String, message: String },

    /// Every constraint set in the fallback ladder failed
    #[error("no {kind} device matched after {attempts} attempts")]
    Exhausted { kind: &'static str, attempts: usize },

    /// Imported bytes could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// FFmpeg or ffprobe could not be found on PATH
    #[error("FFmpeg not found. Please install it (e.g. `brew install ffmpeg`)")]
    FfmpegNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for SourceError {
    fn from(e: image::ImageError) -> Self {
        SourceError::Decode(e.to_string())
    }
}
