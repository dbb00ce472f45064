//! Finished media blobs and the filenames they are saved under.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix for every saved file.
pub const FILE_PREFIX: &str = "facelab";

/// Whether a capture is a still or a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Image,
    Video,
}

/// An encoded image or video held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaBlob {
    /// MIME type, e.g. `image/png` or `video/webm;codecs=vp9,opus`
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBlob")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl MediaBlob {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Concatenate recorder chunks into one blob.
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime: impl Into<String>) -> Self {
        let total = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(&chunk);
        }
        Self::new(mime, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension derived from the MIME type.
    pub fn extension(&self, kind: CaptureKind) -> &'static str {
        match kind {
            CaptureKind::Video if self.mime.contains("mp4") => "mp4",
            CaptureKind::Video => "webm",
            CaptureKind::Image if self.mime.contains("jpeg") => "jpg",
            CaptureKind::Image => "png",
        }
    }

    /// MIME type to advertise, falling back to a default for the kind.
    pub fn effective_mime(&self, kind: CaptureKind) -> &str {
        if !self.mime.is_empty() {
            return &self.mime;
        }
        match kind {
            CaptureKind::Video => "video/webm",
            CaptureKind::Image => "image/png",
        }
    }
}

/// Kind and MIME type for a file, judged by its extension.
pub fn media_type_for_path(path: &Path) -> Option<(CaptureKind, &'static str)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let found = match ext.as_str() {
        "png" => (CaptureKind::Image, "image/png"),
        "jpg" | "jpeg" => (CaptureKind::Image, "image/jpeg"),
        "webp" => (CaptureKind::Image, "image/webp"),
        "gif" => (CaptureKind::Image, "image/gif"),
        "mp4" | "m4v" => (CaptureKind::Video, "video/mp4"),
        "mov" => (CaptureKind::Video, "video/quicktime"),
        "webm" => (CaptureKind::Video, "video/webm"),
        _ => return None,
    };
    Some(found)
}

/// Read a media file into a blob.
pub fn load_media(path: &Path) -> std::io::Result<(MediaBlob, CaptureKind)> {
    let (kind, mime) = media_type_for_path(path).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unrecognised media type: {}", path.display()),
        )
    })?;
    let bytes = std::fs::read(path)?;
    Ok((MediaBlob::new(mime, bytes), kind))
}

/// Filename for a saved capture: `facelab-<millis>.<ext>`.
pub fn suggested_filename(blob: &MediaBlob, kind: CaptureKind, timestamp_ms: u64) -> String {
    format!("{}-{}.{}", FILE_PREFIX, timestamp_ms, blob.extension(kind))
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
