//! Decoding of imported (or freshly captured) media into frame sources.

use std::io::Write;

use super::clip::{ClipPlayback, FfmpegClip};
use super::errors::SourceError;
use super::types::{Frame, FrameFormat};
use crate::blob::{CaptureKind, MediaBlob};

/// Turns encoded media into something the compositor can draw.
pub trait MediaDecoder {
    /// Decode a still image.
    fn decode_image(&mut self, blob: &MediaBlob) -> Result<Frame, SourceError>;

    /// Open a clip for looping playback.
    fn open_clip(&mut self, blob: &MediaBlob) -> Result<Box<dyn ClipPlayback>, SourceError>;
}

/// Decode still bytes with the `image` crate into an RGBA frame.
pub fn decode_still(bytes: &[u8]) -> Result<Frame, SourceError> {
    if bytes.is_empty() {
        return Err(SourceError::Decode("empty image".to_string()));
    }
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(SourceError::Decode("image has no pixels".to_string()));
    }
    Frame::new(rgba.into_raw(), width, height, FrameFormat::Rgba)
        .ok_or_else(|| SourceError::Decode("image buffer size mismatch".to_string()))
}

/// Stills through `image`, clips through a temp file and FFmpeg.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegDecoder;

impl MediaDecoder for FfmpegDecoder {
    fn decode_image(&mut self, blob: &MediaBlob) -> Result<Frame, SourceError> {
        decode_still(&blob.bytes)
    }

    fn open_clip(&mut self, blob: &MediaBlob) -> Result<Box<dyn ClipPlayback>, SourceError> {
        if blob.is_empty() {
            return Err(SourceError::Decode("empty clip".to_string()));
        }
        let suffix = format!(".{}", blob.extension(CaptureKind::Video));
        let mut file = tempfile::Builder::new()
            .prefix("facelab-clip-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&blob.bytes)?;
        file.flush()?;
        log::debug!(
            "Clip {} ({} bytes) staged at {}",
            blob.mime,
            blob.len(),
            file.path().display()
        );
        Ok(Box::new(FfmpegClip::open(file)?))
    }
}
