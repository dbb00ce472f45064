//! Per-frame pipeline: throttle, background, source, pixelation, effects.
//!
//! The loop never blocks. A tick that arrives before the frame budget has
//! elapsed is simply dropped, and the driver keeps ticking.

use crate::compositor::Compositor;
use crate::effects::{screen, EffectEngine};
use crate::source::SourceSlot;
use crate::stage::{Stage, BACKGROUND, PLACEHOLDER};
use crate::text::TextPainter;
use crate::timer::FreezeWindow;

/// Frame-budget throttle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    budget_ms: f64,
    last: Option<u64>,
}

impl FrameClock {
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            last: None,
        }
    }

    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }

    /// Accept a frame at `now` unless the previous one was less than a budget ago.
    pub fn accept(&mut self, now: u64) -> bool {
        if let Some(last) = self.last {
            if (now.saturating_sub(last) as f64) < self.budget_ms {
                return false;
            }
        }
        self.last = Some(now);
        true
    }

    /// Forget the last frame so the next tick is accepted.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// What a tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Throttled; nothing drawn
    Skipped,
    /// Composite plus overlays only
    Light,
    /// Composite, scanlines, particles, overlays and screen effects
    Full,
}

/// The slices of session state one frame touches.
pub struct FrameParts<'a> {
    pub stage: &'a mut Stage,
    pub sources: &'a SourceSlot,
    pub compositor: &'a mut Compositor,
    pub effects: &'a mut EffectEngine,
    pub painter: &'a TextPainter,
    /// A save is in flight
    pub saving: bool,
}

/// Throttle, freeze window and scanline spacing for the render loop.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    clock: FrameClock,
    freeze: FreezeWindow,
    scanline_step: u32,
    frames: u64,
}

impl RenderLoop {
    pub fn new(budget_ms: f64, scanline_step: u32) -> Self {
        Self {
            clock: FrameClock::new(budget_ms),
            freeze: FreezeWindow::default(),
            scanline_step,
            frames: 0,
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Number of frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Defer effect work for `duration_ms` starting at `now`.
    pub fn freeze(&mut self, now: u64, duration_ms: u64) {
        self.freeze.freeze(now, duration_ms);
    }

    pub fn is_frozen(&self, now: u64) -> bool {
        self.freeze.is_active(now)
    }

    /// Let the next tick through regardless of the budget.
    pub fn reset_clock(&mut self) {
        self.clock.reset();
    }

    /// Run one scheduling opportunity.
    pub fn tick(&mut self, now: u64, parts: FrameParts<'_>) -> FrameKind {
        if !self.clock.accept(now) {
            return FrameKind::Skipped;
        }
        self.frames += 1;

        let FrameParts {
            stage,
            sources,
            compositor,
            effects,
            painter,
            saving,
        } = parts;

        stage.fill(BACKGROUND);
        let drawn = match sources.resolve() {
            Some(source) => compositor.compose(source.frame(), stage),
            None => false,
        };
        if !drawn {
            stage.fill(PLACEHOLDER);
        }

        if saving || self.freeze.is_active(now) {
            effects.light_frame(stage.pixmap_mut(), painter);
            return FrameKind::Light;
        }

        screen::draw_scanlines(stage.pixmap_mut(), self.scanline_step);
        effects.full_frame(stage.pixmap_mut(), painter);
        FrameKind::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectId, OverlayOptions};
    use crate::profile::PerformanceProfile;
    use crate::source::Frame;

    struct Rig {
        stage: Stage,
        sources: SourceSlot,
        compositor: Compositor,
        effects: EffectEngine,
        painter: TextPainter,
    }

    impl Rig {
        fn new() -> Self {
            let profile = PerformanceProfile::standard();
            Self {
                stage: Stage::new(320, 426).unwrap(),
                sources: SourceSlot::new(),
                compositor: Compositor::new(&profile, 1, false),
                effects: EffectEngine::seeded(&profile, 9),
                painter: TextPainter::new(),
            }
        }

        fn tick(&mut self, looper: &mut RenderLoop, now: u64, saving: bool) -> FrameKind {
            looper.tick(
                now,
                FrameParts {
                    stage: &mut self.stage,
                    sources: &self.sources,
                    compositor: &mut self.compositor,
                    effects: &mut self.effects,
                    painter: &self.painter,
                    saving,
                },
            )
        }
    }

    #[test]
    fn test_clock_throttles_to_budget() {
        let mut clock = FrameClock::new(33.3);
        assert!(clock.accept(1_000));
        assert!(!clock.accept(1_010));
        assert!(!clock.accept(1_033));
        assert!(clock.accept(1_034));
        clock.reset();
        assert!(clock.accept(1_035));
    }

    #[test]
    fn test_accepted_frames_are_spaced_by_budget() {
        let mut clock = FrameClock::new(50.0);
        let accepted: Vec<u64> = (0..1_000).step_by(7).filter(|t| clock.accept(*t)).collect();
        assert!(accepted.windows(2).all(|w| w[1] - w[0] >= 50));
    }

    #[test]
    fn test_no_source_draws_placeholder() {
        let mut rig = Rig::new();
        let mut looper = RenderLoop::new(33.0, 4);
        assert_eq!(rig.tick(&mut looper, 0, true), FrameKind::Light);
        let px = rig.stage.pixmap().pixel(5, 5).unwrap();
        assert_eq!([px.red(), px.green(), px.blue()], PLACEHOLDER);
    }

    #[test]
    fn test_image_source_is_composited() {
        let mut rig = Rig::new();
        rig.sources.set_image(Frame::solid(64, 64, [200, 10, 10]));
        let mut looper = RenderLoop::new(33.0, 4);
        rig.tick(&mut looper, 0, true);
        let px = rig.stage.pixmap().pixel(100, 101).unwrap();
        assert!(px.red() > px.blue());
    }

    #[test]
    fn test_freeze_and_saving_give_light_frames() {
        let mut rig = Rig::new();
        rig.effects.set_effect(EffectId::Confetti);
        let mut looper = RenderLoop::new(10.0, 4);

        looper.freeze(0, 320);
        for t in (0..320).step_by(20) {
            assert_eq!(rig.tick(&mut looper, t, false), FrameKind::Light);
        }
        assert!(rig.effects.particles().is_empty());
        assert_eq!(rig.tick(&mut looper, 320, false), FrameKind::Full);
        assert_eq!(rig.tick(&mut looper, 340, true), FrameKind::Light);
        assert_eq!(rig.tick(&mut looper, 345, false), FrameKind::Skipped);
    }

    #[test]
    fn test_light_frames_keep_overlays_alive() {
        let mut rig = Rig::new();
        rig.effects
            .add_text("drag me", OverlayOptions::default(), 320.0, 426.0);
        let mut looper = RenderLoop::new(10.0, 4);
        looper.freeze(0, 1_000);
        rig.tick(&mut looper, 0, false);
        let overlay = rig.effects.overlays().iter().next().unwrap();
        assert!(overlay.hit.is_some());
        assert_eq!(looper.frames(), 1);
    }
}
