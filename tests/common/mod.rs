//! In-memory devices for driving a session without FFmpeg.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use facelab::blob::MediaBlob;
use facelab::capture::{CaptureError, CaptureStream, RecorderBackend, RecorderHandle, RecorderOptions};
use facelab::profile::PerformanceProfile;
use facelab::save::{SaveOutcome, SaveSink};
use facelab::session::{Session, SessionDevices, SessionOptions};
use facelab::source::{
    decode_still, new_feed, ClipPlayback, Frame, FrameSequence, MediaConstraints, MediaDecoder,
    MediaProvider, MediaStream, MediaTrack, SourceError, TrackKind,
};
use facelab::stage::Viewport;
use facelab::status::MemoryStatus;
use facelab::text::TextPainter;

/// Smallest stage the fitter allows: 320x426.
pub const SMALL_VIEWPORT: Viewport = Viewport {
    container_width: 300,
    window_height: 400,
    landscape: false,
};

#[derive(Debug, Default)]
pub struct ProviderLog {
    pub cameras: Vec<MediaStream>,
    pub microphones: Vec<MediaStream>,
    pub requests: usize,
}

/// Camera and microphone that always answer with a solid frame.
#[derive(Clone)]
pub struct FakeProvider {
    pub supported: bool,
    pub camera_fails: bool,
    pub mic_fails: bool,
    pub log: Arc<Mutex<ProviderLog>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            supported: true,
            camera_fails: false,
            mic_fails: false,
            log: Arc::default(),
        }
    }
}

impl MediaProvider for FakeProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn acquire(&mut self, constraints: &MediaConstraints) -> Result<MediaStream, SourceError> {
        let mut log = self.log.lock().unwrap();
        log.requests += 1;
        if constraints.video.is_some() {
            if self.camera_fails {
                return Err(SourceError::DeviceFailed {
                    device: "fake".into(),
                    message: "busy".into(),
                });
            }
            let feed = new_feed();
            *feed.lock().unwrap() = Some(Arc::new(Frame::solid(64, 48, [40, 160, 90])));
            let stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Video, "fake camera")])
                .with_frames(feed);
            log.cameras.push(stream.clone());
            Ok(stream)
        } else {
            if self.mic_fails {
                return Err(SourceError::PermissionDenied("microphone".into()));
            }
            let stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "fake mic")]);
            log.microphones.push(stream.clone());
            Ok(stream)
        }
    }
}

#[derive(Debug, Default)]
pub struct RecorderLog {
    pub started: usize,
    pub finished: usize,
    pub frames: usize,
    pub bitrates: Vec<u32>,
    pub audio_tracks: Vec<usize>,
}

/// Recorder that emits one tiny chunk per frame.
#[derive(Clone, Default)]
pub struct FakeRecorder {
    pub unsupported: bool,
    pub start_fails: bool,
    /// Refuse to start once this many recorders have started
    pub start_limit: Option<usize>,
    pub log: Arc<Mutex<RecorderLog>>,
}

struct FakeHandle {
    log: Arc<Mutex<RecorderLog>>,
    pending: Vec<Vec<u8>>,
}

impl RecorderHandle for FakeHandle {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError> {
        self.log.lock().unwrap().frames += 1;
        self.pending.push(rgba.iter().take(4).copied().collect());
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>, CaptureError> {
        self.log.lock().unwrap().finished += 1;
        Ok(self.pending)
    }
}

impl RecorderBackend for FakeRecorder {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        !self.unsupported && mime.starts_with("video/webm")
    }

    fn start(
        &mut self,
        stream: &CaptureStream,
        options: &RecorderOptions,
    ) -> Result<Box<dyn RecorderHandle>, CaptureError> {
        let mut log = self.log.lock().unwrap();
        if self.start_fails || self.start_limit.is_some_and(|limit| log.started >= limit) {
            return Err(CaptureError::RecorderStart("refused".into()));
        }
        log.started += 1;
        log.bitrates.push(options.bits_per_second);
        log.audio_tracks.push(stream.audio_tracks().count());
        Ok(Box::new(FakeHandle {
            log: Arc::clone(&self.log),
            pending: Vec::new(),
        }))
    }
}

#[derive(Debug, Default)]
pub struct DecoderLog {
    pub images: usize,
    pub clips: usize,
}

/// Real still decoding; clips become a short in-memory frame loop.
#[derive(Clone)]
pub struct FakeDecoder {
    /// Frames per opened clip at 10 fps (0 gives an unknown duration)
    pub clip_frames: usize,
    pub log: Arc<Mutex<DecoderLog>>,
}

impl Default for FakeDecoder {
    fn default() -> Self {
        Self {
            clip_frames: 20,
            log: Arc::default(),
        }
    }
}

impl MediaDecoder for FakeDecoder {
    fn decode_image(&mut self, blob: &MediaBlob) -> Result<Frame, SourceError> {
        self.log.lock().unwrap().images += 1;
        decode_still(&blob.bytes)
    }

    fn open_clip(&mut self, blob: &MediaBlob) -> Result<Box<dyn ClipPlayback>, SourceError> {
        if blob.is_empty() {
            return Err(SourceError::Decode("empty clip".into()));
        }
        self.log.lock().unwrap().clips += 1;
        if self.clip_frames == 0 {
            return Ok(Box::new(UnknownLengthClip::default()));
        }
        let frames = (0..self.clip_frames)
            .map(|i| Frame::solid(48, 64, [200, (i * 10 % 255) as u8, 30]))
            .collect();
        Ok(Box::new(FrameSequence::new(frames, 10.0)))
    }
}

/// A clip that reports no duration.
#[derive(Default)]
struct UnknownLengthClip {
    released: bool,
}

impl ClipPlayback for UnknownLengthClip {
    fn current_frame(&self) -> Option<Arc<Frame>> {
        (!self.released).then(|| Arc::new(Frame::solid(48, 64, [10, 10, 200])))
    }

    fn restart(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn duration_secs(&self) -> f64 {
        0.0
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

/// Sink that keeps every saved blob.
#[derive(Clone, Default)]
pub struct FakeSink {
    pub fails: bool,
    pub saved: Arc<Mutex<Vec<(String, MediaBlob)>>>,
}

impl SaveSink for FakeSink {
    fn save(&mut self, blob: &MediaBlob, filename: &str) -> SaveOutcome {
        if self.fails {
            return SaveOutcome::Failed;
        }
        self.saved
            .lock()
            .unwrap()
            .push((filename.to_string(), blob.clone()));
        SaveOutcome::Shared
    }
}

/// Handles onto the fakes a session was built with.
#[derive(Clone, Default)]
pub struct Rig {
    pub provider: FakeProvider,
    pub recorder: FakeRecorder,
    pub decoder: FakeDecoder,
    pub sink: FakeSink,
    pub status: MemoryStatus,
}

impl Rig {
    pub fn options() -> SessionOptions {
        SessionOptions {
            profile: PerformanceProfile::standard(),
            viewport: SMALL_VIEWPORT,
            seed: Some(42),
            ..SessionOptions::default()
        }
    }

    pub fn session(&self) -> Session {
        self.session_with(Self::options())
    }

    pub fn session_with(&self, options: SessionOptions) -> Session {
        let devices = SessionDevices {
            provider: Box::new(self.provider.clone()),
            recorder: Box::new(self.recorder.clone()),
            decoder: Box::new(self.decoder.clone()),
            sink: Box::new(self.sink.clone()),
            status: Box::new(self.status.clone()),
            painter: TextPainter::new(),
        };
        Session::new(options, devices).unwrap()
    }

    pub fn saved(&self) -> Vec<(String, MediaBlob)> {
        self.sink.saved.lock().unwrap().clone()
    }

    pub fn recorder_log(&self) -> std::sync::MutexGuard<'_, RecorderLog> {
        self.recorder.log.lock().unwrap()
    }

    pub fn provider_log(&self) -> std::sync::MutexGuard<'_, ProviderLog> {
        self.provider.log.lock().unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.status
            .snapshot()
            .lines
            .into_iter()
            .map(|(_, line)| line)
            .collect()
    }
}

/// Tick from `from` to `to` (inclusive) every `step` ms. Returns `to`.
pub fn run_until(session: &mut Session, from: u64, to: u64, step: u64) -> u64 {
    let mut now = from;
    while now <= to {
        session.tick(now);
        now += step;
    }
    to
}
