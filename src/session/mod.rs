//! The capture session: one explicit context that owns the stage, the
//! sources, the effect engine, the recorder and every timer.
//!
//! All operations take the current monotonic time in milliseconds and run
//! to completion synchronously. Work that spans time (long press, record
//! countdown, re-composition, the saved acknowledgement, debounced refits)
//! is advanced by [`Session::tick`].

mod export;
mod recording;

use rand::Rng;

use crate::blob::{CaptureKind, MediaBlob};
use crate::capture::{RecorderBackend, ShutterGesture, LONG_PRESS_MS};
use crate::compositor::{Compositor, DEFAULT_PIXEL_INDEX};
use crate::effects::{EffectEngine, EffectId, OverlayOptions, TextStyleId};
use crate::profile::{Capabilities, PerformanceProfile};
use crate::render_loop::{FrameKind, FrameParts, RenderLoop};
use crate::save::SaveSink;
use crate::source::{
    acquire_with_fallback, camera_ladder, Facing, MediaConstraints, MediaDecoder, MediaProvider,
    MediaStream, SourceSlot,
};
use crate::stage::{fit_stage, Stage, StageError, Viewport};
use crate::status::{FlowStep, StatusLevel, StatusSink};
use crate::text::TextPainter;
use crate::timer::Timer;

pub use export::{compose_duration_ms, ComposeJob};
pub use recording::ActiveRecording;

/// Phrases offered by "add text".
pub const PRESET_PHRASES: [&str; 8] = [
    "Wow",
    "Let's go",
    "So cute",
    "Yay",
    "Hehe",
    "I'm the best",
    "Happy to fly",
    "biu biu",
];

/// Extra freeze after the resize debounce elapses.
const RESIZE_SETTLE_MS: u64 = 220;

/// Timing constants for the capture flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTimings {
    /// Hold time that turns a tap into a recording
    pub long_press_ms: u64,
    /// Recordings stop on their own after this long
    pub record_max_ms: u64,
    /// How long the "saved" step shows before the session resets
    pub saved_ack_ms: u64,
    /// Light-frame window opened by each save
    pub save_freeze_ms: u64,
    /// Light-frame window opened by an orientation change
    pub orientation_freeze_ms: u64,
    pub compose_min_ms: u64,
    pub compose_max_ms: u64,
    /// Re-composition length when the clip reports no duration
    pub compose_fallback_secs: f64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            long_press_ms: LONG_PRESS_MS,
            record_max_ms: 10_000,
            saved_ack_ms: 260,
            save_freeze_ms: 700,
            orientation_freeze_ms: 320,
            compose_min_ms: 1_200,
            compose_max_ms: 10_000,
            compose_fallback_secs: 4.0,
        }
    }
}

/// Everything a session is configured with.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub profile: PerformanceProfile,
    pub timings: SessionTimings,
    pub capabilities: Capabilities,
    pub viewport: Viewport,
    pub facing: Facing,
    pub tablet: bool,
    /// Index into the pixel level table
    pub pixel_level: usize,
    pub phrases: Vec<String>,
    /// Fixed RNG seed for reproducible effects
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            profile: PerformanceProfile::standard(),
            timings: SessionTimings::default(),
            capabilities: Capabilities::default(),
            viewport: Viewport::default(),
            facing: Facing::User,
            tablet: false,
            pixel_level: DEFAULT_PIXEL_INDEX,
            phrases: PRESET_PHRASES.iter().map(|p| p.to_string()).collect(),
            seed: None,
        }
    }
}

/// The session's external collaborators.
pub struct SessionDevices {
    pub provider: Box<dyn MediaProvider>,
    pub recorder: Box<dyn RecorderBackend>,
    pub decoder: Box<dyn MediaDecoder>,
    pub sink: Box<dyn SaveSink>,
    pub status: Box<dyn StatusSink>,
    pub painter: TextPainter,
}

/// Where the session is in the capture flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Live preview, nothing pending
    Capture,
    Recording,
    /// A capture is waiting for "done"
    Edit,
    /// Re-recording a pending clip with the current effects
    Composing,
    /// Saved; the session resets shortly
    Saved,
    TornDown,
}

/// The most recent capture awaiting "done".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCapture {
    pub blob: MediaBlob,
    pub kind: CaptureKind,
    /// Effect, style or overlays changed after capture
    pub dirty: bool,
}

/// The single session context.
pub struct Session {
    profile: PerformanceProfile,
    timings: SessionTimings,
    capabilities: Capabilities,
    facing: Facing,
    tablet: bool,
    phrases: Vec<String>,

    stage: Stage,
    sources: SourceSlot,
    microphone: Option<MediaStream>,
    compositor: Compositor,
    effects: EffectEngine,
    painter: TextPainter,
    render: RenderLoop,
    shutter: ShutterGesture,

    recording: Option<ActiveRecording>,
    compose: Option<ComposeJob>,
    pending: Option<PendingCapture>,
    saving: bool,
    reset_timer: Timer,
    fit_timer: Timer,
    next_viewport: Option<Viewport>,
    torn_down: bool,

    provider: Box<dyn MediaProvider>,
    recorder: Box<dyn RecorderBackend>,
    decoder: Box<dyn MediaDecoder>,
    sink: Box<dyn SaveSink>,
    status: Box<dyn StatusSink>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase())
            .field("stage", &self.stage)
            .field("sources", &self.sources)
            .field("pending", &self.pending)
            .field("effect", &self.effects.effect())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(options: SessionOptions, devices: SessionDevices) -> Result<Self, StageError> {
        let SessionOptions {
            profile,
            timings,
            capabilities,
            viewport,
            facing,
            tablet,
            pixel_level,
            phrases,
            seed,
        } = options;

        let (width, height) = fit_stage(viewport, &profile, tablet);
        let stage = Stage::new(width, height)?;
        let effects = match seed {
            Some(seed) => EffectEngine::seeded(&profile, seed),
            None => EffectEngine::new(&profile),
        };
        log::debug!(
            "Session stage {}x{}, profile {:?}, {} fps",
            width,
            height,
            profile.name,
            profile.target_fps
        );

        Ok(Self {
            compositor: Compositor::new(&profile, pixel_level, tablet),
            render: RenderLoop::new(profile.frame_budget_ms(), profile.scanline_step),
            shutter: ShutterGesture::new(timings.long_press_ms),
            profile,
            timings,
            capabilities,
            facing,
            tablet,
            phrases,
            stage,
            sources: SourceSlot::new(),
            microphone: None,
            effects,
            painter: devices.painter,
            recording: None,
            compose: None,
            pending: None,
            saving: false,
            reset_timer: Timer::new(),
            fit_timer: Timer::new(),
            next_viewport: None,
            torn_down: false,
            provider: devices.provider,
            recorder: devices.recorder,
            decoder: devices.decoder,
            sink: devices.sink,
            status: devices.status,
        })
    }

    pub fn phase(&self) -> Phase {
        if self.torn_down {
            Phase::TornDown
        } else if self.recording.is_some() {
            Phase::Recording
        } else if self.compose.is_some() {
            Phase::Composing
        } else if self.reset_timer.is_armed() {
            Phase::Saved
        } else if self.pending.is_some() {
            Phase::Edit
        } else {
            Phase::Capture
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn sources(&self) -> &SourceSlot {
        &self.sources
    }

    pub fn effects(&self) -> &EffectEngine {
        &self.effects
    }

    pub fn pending(&self) -> Option<&PendingCapture> {
        self.pending.as_ref()
    }

    pub fn profile(&self) -> &PerformanceProfile {
        &self.profile
    }

    pub fn timings(&self) -> &SessionTimings {
        &self.timings
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn microphone_live(&self) -> bool {
        self.microphone.as_ref().is_some_and(MediaStream::is_active)
    }

    pub(crate) fn report(&mut self, text: &str) {
        self.status.status(text, StatusLevel::Ok);
    }

    pub(crate) fn report_error(&mut self, text: &str) {
        self.status.status(text, StatusLevel::Error);
    }

    pub(crate) fn set_flow(&mut self, step: FlowStep) {
        self.status.flow(step);
    }

    /// Startup: hint, camera, then a silent microphone warm-up.
    pub fn bootstrap(&mut self) {
        self.set_flow(FlowStep::Capture);
        log::info!("{}", self.capabilities.hint());
        self.render.reset_clock();
        self.report("Tap for a photo, hold to record");
        if !self.start_camera() {
            return;
        }
        if self.prepare_microphone(true) {
            self.report("Camera and microphone ready");
        } else {
            self.report_error("Camera ready, microphone pending");
        }
    }

    /// Acquire the camera through the fallback ladder.
    ///
    /// On success the camera becomes the source and anything pending is dropped.
    pub fn start_camera(&mut self) -> bool {
        if !self.capabilities.live_camera {
            self.report_error("Live camera is not supported here");
            return false;
        }
        if !self.capabilities.secure_context {
            self.report_error("Camera needs a secure context");
            return false;
        }
        self.sources.stop_camera();
        let ladder = camera_ladder(self.facing, self.tablet);
        match acquire_with_fallback(self.provider.as_mut(), &ladder) {
            Ok(stream) => {
                self.sources.set_camera(stream);
                self.pending = None;
                self.report("Camera ready");
                true
            }
            Err(e) => {
                log::warn!("Camera failed: {}", e);
                self.report_error("Camera failed to start");
                false
            }
        }
    }

    /// Make sure a live microphone stream is held. Failure is never fatal.
    pub fn prepare_microphone(&mut self, silent: bool) -> bool {
        if !self.provider.is_supported() {
            if !silent {
                self.report_error("Microphone is not supported here");
            }
            return false;
        }
        if let Some(mic) = &self.microphone {
            if mic.is_active() && mic.audio_tracks().next().is_some() {
                return true;
            }
            mic.stop_all();
        }
        self.microphone = None;
        match self.provider.acquire(&MediaConstraints::microphone()) {
            Ok(stream) => {
                self.microphone = Some(stream);
                true
            }
            Err(e) => {
                log::warn!("Microphone request failed: {}", e);
                if !silent {
                    self.report_error("Microphone not authorized, clips may be silent");
                }
                false
            }
        }
    }

    /// Run one scheduling opportunity.
    pub fn tick(&mut self, now: u64) -> FrameKind {
        if self.torn_down {
            return FrameKind::Skipped;
        }

        if self.fit_timer.fire(now) {
            self.apply_fit();
        }
        self.poll_shutter(now);
        self.advance_recording(now);

        let frame = self.render.tick(
            now,
            FrameParts {
                stage: &mut self.stage,
                sources: &self.sources,
                compositor: &mut self.compositor,
                effects: &mut self.effects,
                painter: &self.painter,
                saving: self.saving,
            },
        );

        self.capture_recording_frame(now);
        self.advance_compose(now);

        if self.reset_timer.fire(now) {
            self.start_new_creation();
        }
        frame
    }

    pub fn select_effect(&mut self, effect: EffectId) {
        self.effects.set_effect(effect);
        self.report(&format!("Effect: {}", effect));
        self.mark_dirty();
    }

    pub fn select_text_style(&mut self, style: TextStyleId) {
        self.effects.set_text_style(style);
        self.report(&format!("Text: {}", style));
        self.mark_dirty();
    }

    /// Add a random preset phrase as a sticky overlay in the current style.
    pub fn add_preset_text(&mut self) -> Option<u64> {
        if self.torn_down || self.saving || self.phrases.is_empty() {
            return None;
        }
        let index = self.effects.rng().gen_range(0..self.phrases.len());
        let phrase = self.phrases[index].clone();
        let options = OverlayOptions {
            sticky: Some(true),
            style: Some(self.effects.text_style()),
            ..OverlayOptions::default()
        };
        let id = self.add_text(&phrase, options);
        self.report("Text added, drag to move");
        self.mark_dirty();
        id
    }

    /// Add an overlay with explicit options.
    pub fn add_text(&mut self, text: &str, options: OverlayOptions) -> Option<u64> {
        let (w, h) = (self.stage.width() as f32, self.stage.height() as f32);
        self.effects.add_text(text, options, w, h)
    }

    pub fn stage_pointer_down(&mut self, pointer_id: u32, x: f32, y: f32) -> bool {
        if self.effects.overlays_mut().begin_drag(pointer_id, x, y).is_none() {
            return false;
        }
        self.report("Dragging text");
        true
    }

    pub fn stage_pointer_move(&mut self, pointer_id: u32, x: f32, y: f32) -> bool {
        let (w, h) = (self.stage.width() as f32, self.stage.height() as f32);
        self.effects.overlays_mut().drag_to(pointer_id, x, y, w, h)
    }

    /// Pointer up or cancel on the stage.
    pub fn stage_pointer_up(&mut self, pointer_id: u32) -> bool {
        if !self.effects.overlays_mut().end_drag(pointer_id) {
            return false;
        }
        self.report("Text placed");
        self.mark_dirty();
        true
    }

    /// Use an imported file as the source.
    pub fn import(&mut self, blob: &MediaBlob, kind: CaptureKind) -> bool {
        match self.open_source(blob, kind) {
            Ok(()) => {
                self.report(match kind {
                    CaptureKind::Image => "Image imported",
                    CaptureKind::Video => "Video imported",
                });
                true
            }
            Err(e) => {
                log::warn!("Import failed: {}", e);
                self.report_error("Could not open that file");
                false
            }
        }
    }

    /// Debounced refit. Effect work is deferred until the layout settles.
    pub fn resize(&mut self, viewport: Viewport, now: u64) {
        let debounce = self.profile.resize_debounce_ms;
        self.render.freeze(now, debounce + RESIZE_SETTLE_MS);
        self.next_viewport = Some(viewport);
        self.fit_timer.arm(now, debounce);
    }

    pub fn orientation_change(&mut self, viewport: Viewport, now: u64) {
        self.render.freeze(now, self.timings.orientation_freeze_ms);
        self.render.reset_clock();
        self.resize(viewport, now);
    }

    fn apply_fit(&mut self) {
        let Some(viewport) = self.next_viewport.take() else {
            return;
        };
        let (width, height) = fit_stage(viewport, &self.profile, self.tablet);
        if (width, height) != (self.stage.width(), self.stage.height()) {
            if let Err(e) = self.stage.resize(width, height) {
                log::warn!("Stage refit failed: {}", e);
            }
        }
        if self.profile.is_low_power() {
            self.effects.clear_particles();
        }
    }

    /// Release everything. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.fit_timer.cancel();
        self.reset_timer.cancel();
        self.shutter.reset();
        self.discard_recording();
        self.discard_compose();
        self.sources.release_all();
        if let Some(mic) = self.microphone.take() {
            mic.stop_all();
        }
        self.torn_down = true;
        log::info!("Session torn down");
    }

    fn mark_dirty(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.dirty = true;
        }
    }

    /// Decode a blob and make it the explicit source.
    fn open_source(&mut self, blob: &MediaBlob, kind: CaptureKind) -> Result<(), crate::source::SourceError> {
        match kind {
            CaptureKind::Image => {
                let frame = self.decoder.decode_image(blob)?;
                self.sources.set_image(frame);
            }
            CaptureKind::Video => {
                let clip = self.decoder.open_clip(blob)?;
                self.sources.set_clip(clip);
            }
        }
        Ok(())
    }

    /// Hold a finished capture for review and show it as the source.
    fn set_pending(&mut self, blob: MediaBlob, kind: CaptureKind) {
        if let Err(e) = self.open_source(&blob, kind) {
            log::warn!("Captured {:?} could not be shown: {}", kind, e);
        }
        self.pending = Some(PendingCapture {
            blob,
            kind,
            dirty: false,
        });
        self.set_flow(FlowStep::Edit);
    }

    /// Back to a fresh live preview.
    fn start_new_creation(&mut self) {
        self.saving = false;
        self.pending = None;
        self.effects.clear();
        self.sources.clear_explicit();
        self.status.progress(0.0);
        self.set_flow(FlowStep::Capture);
        self.report("New round");
        if !self.sources.camera_live() {
            self.start_camera();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
