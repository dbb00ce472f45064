//! Frame, track and stream types shared by every frame source.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Pixel format of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// RGB format (3 bytes per pixel)
    Rgb,
    /// RGBA format (4 bytes per pixel, straight alpha)
    Rgba,
}

/// A decoded picture from a camera, an imported image or a clip.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, row-major
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: FrameFormat,
    /// Timestamp when the frame was decoded
    pub timestamp: Instant,
}

impl Frame {
    /// Build a frame, checking that the buffer matches the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Option<Self> {
        let frame = Self {
            data,
            width,
            height,
            format,
            timestamp: Instant::now(),
        };
        let expected = width as usize * height as usize * frame.bytes_per_pixel();
        (frame.data.len() == expected).then_some(frame)
    }

    /// A frame filled with one opaque colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgb);
        }
        Self {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }

    /// Get the number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            FrameFormat::Rgb => 3,
            FrameFormat::Rgba => 4,
        }
    }

    /// Natural dimensions, or `None` while nothing has been decoded.
    pub fn natural_size(&self) -> Option<(u32, u32)> {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            None
        } else {
            Some((self.width, self.height))
        }
    }

    /// Read one pixel as RGB. Out-of-range reads return black.
    #[inline]
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let bpp = self.bytes_per_pixel();
        let idx = (y as usize * self.width as usize + x as usize) * bpp;
        match self.data.get(idx..idx + 3) {
            Some(px) => [px[0], px[1], px[2]],
            None => [0, 0, 0],
        }
    }
}

/// Latest-frame buffer shared between a capture thread and the render loop.
pub type FrameFeed = Arc<Mutex<Option<Arc<Frame>>>>;

/// Create an empty frame feed.
pub fn new_feed() -> FrameFeed {
    Arc::new(Mutex::new(None))
}

/// Read the newest frame from a feed, if any has arrived.
pub fn latest(feed: &FrameFeed) -> Option<Arc<Frame>> {
    feed.lock().ok()?.clone()
}

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Lifecycle of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// A device input that FFmpeg can open (`-f <format> -i <target>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInput {
    pub format: String,
    pub target: String,
}

/// One media track. Clones share state, so stopping any clone ends all of them.
///
/// The live flag doubles as the stop signal for whatever thread feeds the track.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    kind: TrackKind,
    label: String,
    device: Option<DeviceInput>,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            device: None,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Attach the FFmpeg input that produces this track.
    pub fn with_device(mut self, device: DeviceInput) -> Self {
        self.device = Some(device);
        self
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn device(&self) -> Option<&DeviceInput> {
        self.device.as_ref()
    }

    /// Stop the track. Idempotent.
    pub fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            log::debug!("Stopped {:?} track '{}'", self.kind, self.label);
        }
    }

    pub fn ready_state(&self) -> TrackState {
        if self.live.load(Ordering::SeqCst) {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }

    pub fn is_live(&self) -> bool {
        self.ready_state() == TrackState::Live
    }

    /// Shared stop signal for the producer thread.
    pub fn live_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }
}

/// A bundle of tracks, optionally with a frame feed for its video track.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    pub tracks: Vec<MediaTrack>,
    pub frames: Option<FrameFeed>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            tracks,
            frames: None,
        }
    }

    pub fn with_frames(mut self, feed: FrameFeed) -> Self {
        self.frames = Some(feed);
        self
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// True while at least one track is live.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn add_track(&mut self, track: MediaTrack) {
        self.tracks.push(track);
    }

    /// Stop every track. Safe to call repeatedly.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Newest decoded frame, if this stream carries one.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frames.as_ref().and_then(latest)
    }
}

/// Which way the camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    #[default]
    User,
    Environment,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::User => write!(f, "user"),
            Facing::Environment => write!(f, "environment"),
        }
    }
}

/// How strongly a facing mode is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingRequest {
    Ideal(Facing),
    Exact(Facing),
}

/// Video part of an acquisition request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoConstraints {
    pub facing: Option<FacingRequest>,
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
}

/// Audio part of an acquisition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// A full acquisition request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: Option<AudioConstraints>,
}

impl MediaConstraints {
    /// Any video device, no audio.
    pub fn any_video() -> Self {
        Self {
            video: Some(VideoConstraints::default()),
            audio: None,
        }
    }

    /// Microphone only.
    pub fn microphone() -> Self {
        Self {
            video: None,
            audio: Some(AudioConstraints::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new_checks_length() {
        assert!(Frame::new(vec![0; 12], 2, 2, FrameFormat::Rgb).is_some());
        assert!(Frame::new(vec![0; 12], 2, 2, FrameFormat::Rgba).is_none());
        assert!(Frame::new(vec![0; 16], 2, 2, FrameFormat::Rgba).is_some());
    }

    #[test]
    fn test_natural_size_empty_frame() {
        let frame = Frame::solid(0, 0, [1, 2, 3]);
        assert_eq!(frame.natural_size(), None);
        assert_eq!(Frame::solid(4, 3, [0, 0, 0]).natural_size(), Some((4, 3)));
    }

    #[test]
    fn test_rgb_at_reads_rgba() {
        let frame = Frame::new(vec![1, 2, 3, 255, 4, 5, 6, 255], 2, 1, FrameFormat::Rgba).unwrap();
        assert_eq!(frame.rgb_at(1, 0), [4, 5, 6]);
        assert_eq!(frame.rgb_at(5, 5), [0, 0, 0]);
    }

    #[test]
    fn test_track_clones_share_state() {
        let track = MediaTrack::new(TrackKind::Video, "cam");
        let clone = track.clone();
        clone.stop();
        assert_eq!(track.ready_state(), TrackState::Ended);
        // second stop is a no-op
        track.stop();
        assert!(!track.is_live());
    }

    #[test]
    fn test_stream_active_until_all_stopped() {
        let stream = MediaStream::new(vec![
            MediaTrack::new(TrackKind::Video, "v"),
            MediaTrack::new(TrackKind::Audio, "a"),
        ]);
        assert!(stream.is_active());
        assert_eq!(stream.audio_tracks().count(), 1);
        stream.stop_all();
        assert!(!stream.is_active());
    }

    #[test]
    fn test_latest_frame_from_feed() {
        let feed = new_feed();
        let stream = MediaStream::new(vec![]).with_frames(feed.clone());
        assert!(stream.latest_frame().is_none());
        *feed.lock().unwrap() = Some(Arc::new(Frame::solid(2, 2, [9, 9, 9])));
        assert_eq!(stream.latest_frame().unwrap().width, 2);
    }
}
