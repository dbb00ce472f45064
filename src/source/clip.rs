//! Looping playback of an imported or freshly recorded clip.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tempfile::NamedTempFile;

use super::errors::SourceError;
use super::ffmpeg::{pipeline_to_source, run_capture_loop};
use super::types::{latest, new_feed, Frame, FrameFeed, MediaTrack, TrackKind};
use crate::pipeline::{run_to_completion, Pipeline};

/// A clip that can serve as a frame source.
pub trait ClipPlayback: Send {
    /// Frame for the current playback position, `None` until one is decoded.
    fn current_frame(&self) -> Option<Arc<Frame>>;

    /// Seek to the start and play again.
    fn restart(&mut self) -> Result<(), SourceError>;

    /// Duration in seconds, 0.0 when unknown.
    fn duration_secs(&self) -> f64;

    /// Stop playback and free the backing media. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Stream properties reported by ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipInfo {
    pub width: u32,
    pub height: u32,
    pub duration_sec: f64,
}

/// Probe a media file with ffprobe.
pub fn probe_clip(path: &Path) -> Result<ClipInfo, SourceError> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let path_str = path.to_string_lossy();
    let out = run_to_completion(
        "ffprobe",
        &[
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
            path_str.as_ref(),
        ],
    )
    .map_err(pipeline_to_source)?;

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| SourceError::Decode(format!("ffprobe json parse failed: {e}")))?;
    parse_probe(parsed.streams.into_iter().map(|s| {
        (s.codec_type, s.width, s.height, s.duration)
    }), parsed.format.and_then(|f| f.duration))
}

type ProbeFields = (Option<String>, Option<u32>, Option<u32>, Option<String>);

fn parse_probe(
    streams: impl Iterator<Item = ProbeFields>,
    format_duration: Option<String>,
) -> Result<ClipInfo, SourceError> {
    let (_, width, height, stream_duration) = streams
        .into_iter()
        .find(|(kind, ..)| kind.as_deref() == Some("video"))
        .ok_or_else(|| SourceError::Decode("no video stream found".to_string()))?;
    let width = width.ok_or_else(|| SourceError::Decode("missing video width".to_string()))?;
    let height = height.ok_or_else(|| SourceError::Decode("missing video height".to_string()))?;

    // Recorder output streamed to a pipe often carries no duration at all.
    let duration_sec = format_duration
        .or(stream_duration)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    Ok(ClipInfo {
        width,
        height,
        duration_sec,
    })
}

/// Clip backed by a temp file and a real-time FFmpeg decoder.
///
/// The temp file is the clip's "object URL": releasing the clip deletes it.
pub struct FfmpegClip {
    file: Option<NamedTempFile>,
    path: PathBuf,
    info: ClipInfo,
    feed: FrameFeed,
    playback: Option<MediaTrack>,
}

impl std::fmt::Debug for FfmpegClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegClip")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("released", &self.is_released())
            .finish()
    }
}

impl FfmpegClip {
    /// Take ownership of a temp file holding the clip and start playing it.
    pub fn open(file: NamedTempFile) -> Result<Self, SourceError> {
        let path = file.path().to_path_buf();
        let info = probe_clip(&path)?;
        let mut clip = Self {
            file: Some(file),
            path,
            info,
            feed: new_feed(),
            playback: None,
        };
        clip.play()?;
        Ok(clip)
    }

    pub fn info(&self) -> ClipInfo {
        self.info
    }

    fn play(&mut self) -> Result<(), SourceError> {
        if let Some(track) = self.playback.take() {
            track.stop();
        }
        let args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-re",
            "-stream_loop",
            "-1",
            "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(self.path.to_string_lossy().into_owned()))
        .chain(
            ["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
                .iter()
                .map(|s| s.to_string()),
        )
        .collect();

        let mut pipeline = Pipeline::spawn("ffmpeg", &args, false).map_err(pipeline_to_source)?;
        let stdout = pipeline
            .take_stdout()
            .ok_or_else(|| SourceError::Decode("clip decoder has no stdout".to_string()))?;

        let track = MediaTrack::new(TrackKind::Video, format!("clip {}", self.path.display()));
        let live = track.live_flag();
        let feed = Arc::clone(&self.feed);
        let (width, height) = (self.info.width, self.info.height);
        let (ready_tx, _ready_rx) = mpsc::channel();
        thread::spawn(move || {
            run_capture_loop(pipeline, stdout, width, height, feed, live, ready_tx);
        });
        self.playback = Some(track);
        Ok(())
    }
}

impl ClipPlayback for FfmpegClip {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        latest(&self.feed)
    }

    fn restart(&mut self) -> Result<(), SourceError> {
        if self.is_released() {
            return Err(SourceError::Decode("clip already released".to_string()));
        }
        self.play()
    }

    fn duration_secs(&self) -> f64 {
        self.info.duration_sec
    }

    fn release(&mut self) {
        if let Some(track) = self.playback.take() {
            track.stop();
        }
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                log::warn!("Failed to remove clip file {}: {}", self.path.display(), e);
            }
        }
    }

    fn is_released(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for FfmpegClip {
    fn drop(&mut self) {
        self.release();
    }
}

/// In-memory clip: a fixed list of frames played back in a loop.
pub struct FrameSequence {
    frames: Vec<Arc<Frame>>,
    fps: f64,
    started: Instant,
    released: bool,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        Self {
            frames: frames.into_iter().map(Arc::new).collect(),
            fps: fps.max(1.0),
            started: Instant::now(),
            released: false,
        }
    }
}

impl ClipPlayback for FrameSequence {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        if self.released || self.frames.is_empty() {
            return None;
        }
        let index = (self.started.elapsed().as_secs_f64() * self.fps) as usize % self.frames.len();
        self.frames.get(index).cloned()
    }

    fn restart(&mut self) -> Result<(), SourceError> {
        self.started = Instant::now();
        Ok(())
    }

    fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }

    fn release(&mut self) {
        self.released = true;
        self.frames.clear();
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(kind: &str, w: Option<u32>, h: Option<u32>, d: Option<&str>) -> ProbeFields {
        (Some(kind.to_string()), w, h, d.map(str::to_string))
    }

    #[test]
    fn test_parse_probe_prefers_format_duration() {
        let info = parse_probe(
            vec![
                stream("audio", None, None, Some("3.0")),
                stream("video", Some(640), Some(480), Some("2.5")),
            ]
            .into_iter(),
            Some("4.2".to_string()),
        )
        .unwrap();
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 480);
        assert!((info.duration_sec - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_unknown_duration_is_zero() {
        let info = parse_probe(
            vec![stream("video", Some(2), Some(2), Some("N/A"))].into_iter(),
            None,
        )
        .unwrap();
        assert_eq!(info.duration_sec, 0.0);
    }

    #[test]
    fn test_parse_probe_without_video_fails() {
        let err = parse_probe(vec![stream("audio", None, None, None)].into_iter(), None);
        assert!(err.is_err());
    }

    #[test]
    fn test_frame_sequence_release() {
        let mut seq = FrameSequence::new(vec![Frame::solid(2, 2, [1, 1, 1])], 10.0);
        assert!(seq.current_frame().is_some());
        assert!((seq.duration_secs() - 0.1).abs() < 1e-9);
        seq.release();
        assert!(seq.is_released());
        assert!(seq.current_frame().is_none());
    }
}
