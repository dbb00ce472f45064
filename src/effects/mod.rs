//! Effect & particle engine.
//!
//! Each full frame runs spawn, advance, cull and render in that order for
//! particles, then advances and draws overlays, then draws the stateless
//! glitch or speed-line layer. Light frames only touch overlays.

pub mod overlays;
pub mod particles;
pub mod screen;
pub mod style;

use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tiny_skia::Pixmap;

pub use overlays::{HitBox, Lifespan, OverlayOptions, OverlaySet, TextOverlay, MAX_OVERLAYS};
pub use particles::{Particle, ParticleSet, Shape};
pub use style::TextStyleId;

use crate::profile::PerformanceProfile;
use crate::text::{Rgba, TextPainter};

/// Uniform sample in `[min, max)`. Returns `min` for an empty range.
pub(crate) fn range<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

fn pick<R: Rng + ?Sized, T: Copy>(rng: &mut R, items: &[T]) -> T {
    items[rng.gen_range(0..items.len())]
}

const SPARK_COLORS: [Rgba; 4] = [
    Rgba::hex(0x7dd3ff),
    Rgba::hex(0xffffff),
    Rgba::hex(0x9de3d5),
    Rgba::hex(0xffd166),
];

const HEART_COLORS: [Rgba; 4] = [
    Rgba::hex(0xff4d8f),
    Rgba::hex(0xff7aa8),
    Rgba::hex(0xffc4d8),
    Rgba::hex(0xff5f7f),
];

const CONFETTI_COLORS: [Rgba; 6] = [
    Rgba::hex(0xffd166),
    Rgba::hex(0x06d6a0),
    Rgba::hex(0x118ab2),
    Rgba::hex(0xef476f),
    Rgba::hex(0x8ecae6),
    Rgba::hex(0xff7f50),
];

const BURST_COLORS: [Rgba; 3] = [Rgba::hex(0x76dbff), Rgba::hex(0xffc0df), Rgba::hex(0xffd77f)];

const OVERLAY_COLORS: [Rgba; 5] = [
    Rgba::hex(0xffffff),
    Rgba::hex(0xffe082),
    Rgba::hex(0xffd8f0),
    Rgba::hex(0xbaf4ff),
    Rgba::hex(0xbde7bd),
];

/// Selected screen effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectId {
    #[default]
    None,
    /// Twinkling sparks and stars all over the stage
    Spark,
    /// Hearts floating up from the bottom edge
    Heart,
    /// Horizontal colour bands
    Glitch,
    /// Confetti raining from the top
    Confetti,
    /// Speed-line streaks
    Speed,
}

impl EffectId {
    pub const ALL: [EffectId; 6] = [
        EffectId::None,
        EffectId::Spark,
        EffectId::Heart,
        EffectId::Glitch,
        EffectId::Confetti,
        EffectId::Speed,
    ];

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "spark" | "sparks" => Some(Self::Spark),
            "heart" | "hearts" => Some(Self::Heart),
            "glitch" => Some(Self::Glitch),
            "confetti" => Some(Self::Confetti),
            "speed" => Some(Self::Speed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        *self != Self::None
    }
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Spark => write!(f, "spark"),
            Self::Heart => write!(f, "heart"),
            Self::Glitch => write!(f, "glitch"),
            Self::Confetti => write!(f, "confetti"),
            Self::Speed => write!(f, "speed"),
        }
    }
}

/// Spawn and drawing limits taken from the performance profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectLimits {
    pub max_particles: usize,
    pub burst_count: usize,
    pub spark_spawn_max: usize,
    pub confetti_spawn_max: usize,
    pub glitch_lines: usize,
    pub speed_lines: usize,
}

impl From<&PerformanceProfile> for EffectLimits {
    fn from(profile: &PerformanceProfile) -> Self {
        Self {
            max_particles: profile.max_particles,
            burst_count: profile.burst_count,
            spark_spawn_max: profile.spark_spawn_max,
            confetti_spawn_max: profile.confetti_spawn_max,
            glitch_lines: profile.glitch_lines,
            speed_lines: profile.speed_lines,
        }
    }
}

/// Owns particles, overlays, the current effect/style selection and the RNG.
#[derive(Debug)]
pub struct EffectEngine {
    limits: EffectLimits,
    effect: EffectId,
    text_style: TextStyleId,
    particles: ParticleSet,
    overlays: OverlaySet,
    rng: StdRng,
}

impl EffectEngine {
    pub fn new(profile: &PerformanceProfile) -> Self {
        Self::with_rng(profile, StdRng::from_entropy())
    }

    /// Deterministic engine for tests and replays.
    pub fn seeded(profile: &PerformanceProfile, seed: u64) -> Self {
        Self::with_rng(profile, StdRng::seed_from_u64(seed))
    }

    fn with_rng(profile: &PerformanceProfile, rng: StdRng) -> Self {
        let limits = EffectLimits::from(profile);
        Self {
            limits,
            effect: EffectId::None,
            text_style: TextStyleId::Classic,
            particles: ParticleSet::new(limits.max_particles),
            overlays: OverlaySet::new(),
            rng,
        }
    }

    pub fn effect(&self) -> EffectId {
        self.effect
    }

    pub fn set_effect(&mut self, effect: EffectId) {
        self.effect = effect;
    }

    pub fn text_style(&self) -> TextStyleId {
        self.text_style
    }

    pub fn set_text_style(&mut self, style: TextStyleId) {
        self.text_style = style;
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut OverlaySet {
        &mut self.overlays
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn clear_particles(&mut self) {
        self.particles.clear();
    }

    /// Drop all particles and overlays.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.overlays.clear();
    }

    /// Add a text overlay and a spark burst at its position.
    ///
    /// Unset options are randomized: sticky by default, placed in the lower
    /// part of the stage, 28 to 44 px, in the current text style.
    pub fn add_text(&mut self, text: &str, options: OverlayOptions, stage_w: f32, stage_h: f32) -> Option<u64> {
        if text.is_empty() {
            return None;
        }
        let rng = &mut self.rng;
        let sticky = options.sticky.unwrap_or(true);
        let x = options.x.unwrap_or_else(|| range(rng, 80.0, stage_w - 80.0));
        let y = options
            .y
            .unwrap_or_else(|| range(rng, stage_h * 0.58, stage_h * 0.88));
        let font_size = options.font_size.unwrap_or_else(|| range(rng, 28.0, 44.0));
        let color = pick(rng, &OVERLAY_COLORS);
        let (vx, vy, lifespan) = if sticky {
            (0.0, 0.0, Lifespan::Forever)
        } else {
            (
                range(rng, -0.35, 0.35),
                range(rng, -1.45, -0.55),
                Lifespan::Frames(range(rng, 130.0, 220.0)),
            )
        };
        let id = self.overlays.insert(TextOverlay {
            id: 0,
            text: text.to_string(),
            x,
            y,
            vx,
            vy,
            age: 0,
            lifespan,
            font_size,
            color,
            style: options.style.unwrap_or(self.text_style),
            hit: None,
        });
        let burst_color = pick(&mut self.rng, &BURST_COLORS);
        self.emit_burst(x, y, burst_color);
        Some(id)
    }

    /// Radial spark burst.
    pub fn emit_burst(&mut self, x: f32, y: f32, color: Rgba) {
        for _ in 0..self.limits.burst_count {
            let rng = &mut self.rng;
            let particle = Particle {
                shape: Shape::Spark,
                x,
                y,
                vx: range(rng, -2.2, 2.2),
                vy: range(rng, -2.2, 2.2),
                rotation: 0.0,
                vr: 0.0,
                size: range(rng, 1.4, 3.6),
                color,
                age: 0,
                max_age: range(rng, 20.0, 56.0),
            };
            self.particles.push(particle);
        }
    }

    /// Probabilistically spawn particles for the current effect.
    pub fn spawn(&mut self, stage_w: f32, stage_h: f32) {
        let limits = self.limits;
        let rng = &mut self.rng;
        let mut fresh = Vec::new();
        match self.effect {
            EffectId::Spark if rng.gen_bool(0.9) => {
                let count = if rng.gen_bool(0.55) { limits.spark_spawn_max } else { 1 };
                for _ in 0..count {
                    fresh.push(Particle {
                        shape: if rng.gen_bool(0.35) { Shape::Star } else { Shape::Spark },
                        x: range(rng, 0.0, stage_w),
                        y: range(rng, 0.0, stage_h),
                        vx: range(rng, -0.9, 0.9),
                        vy: range(rng, -1.6, -0.1),
                        rotation: range(rng, 0.0, TAU),
                        vr: range(rng, -0.12, 0.12),
                        size: range(rng, 1.8, 5.4),
                        color: pick(rng, &SPARK_COLORS),
                        age: 0,
                        max_age: range(rng, 38.0, 110.0),
                    });
                }
            }
            EffectId::Heart if rng.gen_bool(0.6) => {
                let count = if rng.gen_bool(0.5) { 2 } else { 1 };
                for _ in 0..count {
                    fresh.push(Particle {
                        shape: Shape::Heart,
                        x: range(rng, 20.0, stage_w - 20.0),
                        y: stage_h + 10.0,
                        vx: range(rng, -0.8, 0.8),
                        vy: range(rng, -2.5, -1.1),
                        rotation: 0.0,
                        vr: 0.0,
                        size: range(rng, 16.0, 30.0),
                        color: pick(rng, &HEART_COLORS),
                        age: 0,
                        max_age: range(rng, 90.0, 180.0),
                    });
                }
            }
            EffectId::Confetti if rng.gen_bool(0.82) => {
                let count = if rng.gen_bool(0.5) { limits.confetti_spawn_max } else { 1 };
                for _ in 0..count {
                    fresh.push(Particle {
                        shape: if rng.gen_bool(0.25) { Shape::Star } else { Shape::Confetti },
                        x: range(rng, 0.0, stage_w),
                        y: -10.0,
                        vx: range(rng, -1.2, 1.2),
                        vy: range(rng, 1.8, 3.6),
                        rotation: range(rng, 0.0, TAU),
                        vr: range(rng, -0.22, 0.22),
                        size: range(rng, 6.0, 12.0),
                        color: pick(rng, &CONFETTI_COLORS),
                        age: 0,
                        max_age: range(rng, 90.0, 180.0),
                    });
                }
            }
            _ => {}
        }
        for particle in fresh {
            self.particles.push(particle);
        }
    }

    /// Full effect pass over an already composited stage.
    pub fn full_frame(&mut self, pixmap: &mut Pixmap, painter: &TextPainter) {
        let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
        self.spawn(w, h);
        self.particles.advance();
        self.particles.render(pixmap);
        self.overlays.advance(painter);
        self.overlays.render(pixmap, painter, &mut self.rng);
        match self.effect {
            EffectId::Glitch => screen::draw_glitch(pixmap, &mut self.rng, self.limits.glitch_lines),
            EffectId::Speed => screen::draw_speed_lines(pixmap, &mut self.rng, self.limits.speed_lines),
            _ => {}
        }
    }

    /// Overlays only: keeps drag responsive while effect work is deferred.
    pub fn light_frame(&mut self, pixmap: &mut Pixmap, painter: &TextPainter) {
        self.overlays.advance(painter);
        self.overlays.render(pixmap, painter, &mut self.rng);
    }
}
