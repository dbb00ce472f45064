//! Capture primitives: recorder negotiation, the FFmpeg recorder and the
//! shutter gesture.

pub mod errors;
pub mod ffmpeg;
pub mod gesture;
pub mod recorder;

pub use errors::CaptureError;
pub use ffmpeg::{mime_codecs, parse_encoders, FfmpegRecorderBackend, MimeCodecs};
pub use gesture::{ShutterAction, ShutterGesture, LONG_PRESS_MS};
pub use recorder::{
    pick_mime, CaptureStream, RecorderBackend, RecorderHandle, RecorderOptions, Recording,
    FALLBACK_VIDEO_MIME, MIME_PREFERENCES,
};
