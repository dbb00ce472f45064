//! Recorder primitive, mime negotiation and the stage capture stream.
//!
//! A [`Recording`] ties a [`CaptureStream`] (stage frames at a fixed rate,
//! plus any merged audio tracks) to a recorder handle, accumulates its data
//! chunks and concatenates them into one blob on stop. Stop runs once.

use super::errors::CaptureError;
use crate::blob::MediaBlob;
use crate::source::{MediaTrack, TrackKind};
use crate::stage::Stage;

/// Container/codec preferences, best first.
pub const MIME_PREFERENCES: [&str; 5] = [
    "video/mp4;codecs=h264,aac",
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
    "video/mp4",
];

/// Mime used to tag a blob when the recorder did not report one.
pub const FALLBACK_VIDEO_MIME: &str = "video/webm";

/// Interval at which recorder data is collected into chunks.
pub const DEFAULT_TIMESLICE_MS: u64 = 220;

/// First preferred mime the recorder accepts.
pub fn pick_mime<F>(is_supported: F) -> Option<&'static str>
where
    F: Fn(&str) -> bool,
{
    MIME_PREFERENCES.iter().copied().find(|mime| is_supported(mime))
}

/// Recorder construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub mime: String,
    pub bits_per_second: u32,
    pub timeslice_ms: u64,
}

/// Something that can construct recorders.
pub trait RecorderBackend {
    /// Whether recording is possible at all.
    fn is_supported(&self) -> bool;

    /// Whether this mime type can be produced.
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Construct and start a recorder fed by `stream`.
    fn start(
        &mut self,
        stream: &CaptureStream,
        options: &RecorderOptions,
    ) -> Result<Box<dyn RecorderHandle>, CaptureError>;
}

/// A running recorder.
pub trait RecorderHandle: Send {
    /// Feed one straight-alpha RGBA frame of the stream's size.
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError>;

    /// Data produced since the last call.
    fn take_chunks(&mut self) -> Vec<Vec<u8>>;

    /// Stop, flush and return whatever data is left.
    fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>, CaptureError>;
}

/// Stage frames sampled at a fixed rate, with optional audio tracks.
#[derive(Debug, Clone)]
pub struct CaptureStream {
    fps: u32,
    width: u32,
    height: u32,
    last_frame: Option<u64>,
    tracks: Vec<MediaTrack>,
}

impl CaptureStream {
    /// Open a capture stream over the stage at `fps`.
    pub fn new(stage: &Stage, fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            width: stage.width(),
            height: stage.height(),
            last_frame: None,
            tracks: vec![MediaTrack::new(TrackKind::Video, "stage")],
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// Merge an audio track. Video tracks are ignored.
    pub fn add_audio_track(&mut self, track: MediaTrack) {
        if track.kind() == TrackKind::Audio {
            self.tracks.push(track);
        }
    }

    /// Whether a frame at `now` is due. Marks it taken when it is.
    pub fn frame_due(&mut self, now: u64) -> bool {
        let interval = 1000 / self.fps as u64;
        match self.last_frame {
            Some(last) if now.saturating_sub(last) < interval => false,
            _ => {
                self.last_frame = Some(now);
                true
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stop the stage track. Merged audio tracks belong to the microphone
    /// slot and stay live.
    pub fn stop(&self) {
        for track in self.tracks.iter().filter(|t| t.kind() == TrackKind::Video) {
            track.stop();
        }
    }
}

/// One clip being recorded.
pub struct Recording {
    handle: Option<Box<dyn RecorderHandle>>,
    stream: CaptureStream,
    mime: String,
    chunks: Vec<Vec<u8>>,
    started_at: u64,
    timeslice_ms: u64,
    last_flush: u64,
    frames: u64,
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("mime", &self.mime)
            .field("active", &self.is_active())
            .field("chunks", &self.chunks.len())
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl Recording {
    /// Negotiate a mime type and start recording `stream`.
    ///
    /// On failure the stream's stage track is stopped before returning.
    pub fn start(
        backend: &mut dyn RecorderBackend,
        stream: CaptureStream,
        bits_per_second: u32,
        now: u64,
    ) -> Result<Self, CaptureError> {
        let Some(mime) = pick_mime(|m| backend.is_type_supported(m)) else {
            stream.stop();
            return Err(CaptureError::NoSupportedMime {
                tried: MIME_PREFERENCES.len(),
            });
        };
        let options = RecorderOptions {
            mime: mime.to_string(),
            bits_per_second,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
        };
        let handle = match backend.start(&stream, &options) {
            Ok(handle) => handle,
            Err(e) => {
                stream.stop();
                return Err(e);
            }
        };
        log::info!(
            "Recording {}x{} @ {} fps as {}",
            stream.width,
            stream.height,
            stream.fps,
            mime
        );
        Ok(Self {
            handle: Some(handle),
            stream,
            mime: options.mime,
            chunks: Vec::new(),
            started_at: now,
            timeslice_ms: options.timeslice_ms,
            last_flush: now,
            frames: 0,
        })
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.started_at)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn stream(&self) -> &CaptureStream {
        &self.stream
    }

    /// Sample the stage if a stream frame is due and collect finished chunks
    /// once per timeslice.
    pub fn capture(&mut self, stage: &Stage, now: u64) -> Result<(), CaptureError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        if stage.width() != self.stream.width || stage.height() != self.stream.height {
            // frame size is fixed when the recorder starts
            log::debug!("Stage size changed mid-recording; frame skipped");
        } else if self.stream.frame_due(now) {
            handle.write_frame(&stage.to_rgba())?;
            self.frames += 1;
        }
        if now.saturating_sub(self.last_flush) >= self.timeslice_ms {
            self.last_flush = now;
            self.chunks.extend(handle.take_chunks());
        }
        Ok(())
    }

    /// Stop the recorder and build the finished blob.
    ///
    /// Returns `None` when already stopped, so only the first call yields a blob.
    pub fn stop(&mut self) -> Option<Result<MediaBlob, CaptureError>> {
        let handle = self.handle.take()?;
        let result = handle.finish();
        self.stream.stop();
        Some(result.and_then(|rest| {
            let mut chunks = std::mem::take(&mut self.chunks);
            chunks.extend(rest);
            chunks.retain(|c| !c.is_empty());
            if chunks.is_empty() {
                return Err(CaptureError::Empty);
            }
            let mime = if self.mime.is_empty() {
                FALLBACK_VIDEO_MIME.to_string()
            } else {
                self.mime.clone()
            };
            Ok(MediaBlob::from_chunks(chunks, mime))
        }))
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        if self.is_active() {
            let _ = self.stop();
        }
    }
}
