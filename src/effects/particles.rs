//! Particles: bounded, aging, fading sprites.

use std::collections::VecDeque;
use std::f32::consts::PI;

use tiny_skia::{FillRule, Path, PathBuilder, Pixmap, Rect, Transform};

use crate::stage::solid_paint;
use crate::text::Rgba;

/// What a particle looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Filled circle
    Spark,
    /// Four-pointed star
    Star,
    Heart,
    /// Rotated rectangle
    Confetti,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub shape: Shape,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Radians
    pub rotation: f32,
    pub vr: f32,
    pub size: f32,
    pub color: Rgba,
    pub age: u32,
    pub max_age: f32,
}

impl Particle {
    /// Linear fade: 1 at birth, 0 at `max_age`.
    pub fn alpha(&self) -> f32 {
        (1.0 - self.age as f32 / self.max_age).max(0.0)
    }

    pub fn expired(&self) -> bool {
        self.age as f32 > self.max_age
    }
}

/// Particle collection capped at a fixed size. Oldest entries go first.
#[derive(Debug, Clone)]
pub struct ParticleSet {
    items: VecDeque<Particle>,
    cap: usize,
}

impl ParticleSet {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.items.iter()
    }

    pub fn push(&mut self, particle: Particle) {
        self.items.push_back(particle);
        while self.items.len() > self.cap {
            self.items.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Age every particle by one frame, drop the expired ones and move the rest.
    pub fn advance(&mut self) {
        self.items.retain_mut(|p| {
            p.age += 1;
            if p.expired() {
                return false;
            }
            p.x += p.vx;
            p.y += p.vy;
            p.rotation += p.vr;
            true
        });
    }

    pub fn render(&self, pixmap: &mut Pixmap) {
        for p in &self.items {
            draw_particle(pixmap, p);
        }
    }
}

fn draw_particle(pixmap: &mut Pixmap, p: &Particle) {
    let mut paint = solid_paint(p.color.rgb(), p.color.a * p.alpha());
    paint.anti_alias = true;
    let rotate = Transform::from_rotate(p.rotation.to_degrees()).post_translate(p.x, p.y);
    let (path, transform) = match p.shape {
        Shape::Spark => (PathBuilder::from_circle(p.x, p.y, p.size.max(0.5)), Transform::identity()),
        Shape::Star => (star_path(p.size.max(5.0)), rotate),
        Shape::Heart => (heart_path(p.size), Transform::from_translate(p.x, p.y)),
        Shape::Confetti => (
            Rect::from_xywh(-p.size / 2.0, -p.size / 2.0, p.size, p.size * 0.74).map(PathBuilder::from_rect),
            rotate,
        ),
    };
    if let Some(path) = path {
        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
    }
}

/// Star centered on the origin.
fn star_path(radius: f32) -> Option<Path> {
    let inner = radius * 0.38;
    let mut pb = PathBuilder::new();
    for i in 0..8 {
        let r = if i % 2 == 0 { radius } else { inner };
        let angle = i as f32 * PI / 4.0 - PI / 2.0;
        let (x, y) = (r * angle.cos(), r * angle.sin());
        if i == 0 {
            pb.move_to(x, y);
        } else {
            pb.line_to(x, y);
        }
    }
    pb.close();
    pb.finish()
}

/// Heart whose bottom tip sits on the origin, roughly `size` tall.
fn heart_path(size: f32) -> Option<Path> {
    let s = size.max(1.0);
    let mut pb = PathBuilder::new();
    pb.move_to(0.0, 0.0);
    pb.cubic_to(-s * 0.55, -s * 0.35, -s * 0.55, -s * 0.85, -s * 0.25, -s * 0.85);
    pb.cubic_to(-s * 0.1, -s * 0.85, 0.0, -s * 0.75, 0.0, -s * 0.62);
    pb.cubic_to(0.0, -s * 0.75, s * 0.1, -s * 0.85, s * 0.25, -s * 0.85);
    pb.cubic_to(s * 0.55, -s * 0.85, s * 0.55, -s * 0.35, 0.0, 0.0);
    pb.close();
    pb.finish()
}
