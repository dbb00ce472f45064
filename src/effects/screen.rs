//! Stateless full-width screen effects, regenerated every frame.

use rand::Rng;
use tiny_skia::{LineCap, PathBuilder, Pixmap, Rect, Stroke, Transform};

use super::range;
use crate::stage::solid_paint;

const SCANLINE_ALPHA: f32 = 0.07;
const GLITCH_BAND_ALPHA: f32 = 0.34;
const GLITCH_BAND_CHANCE: f64 = 0.8;
const SPEED_LINE_ALPHA: f32 = 0.34 * 0.95;

/// One-pixel dark rows every `step` rows.
pub fn draw_scanlines(pixmap: &mut Pixmap, step: u32) {
    let step = step.max(1);
    let width = pixmap.width() as f32;
    let paint = solid_paint([0, 0, 0], SCANLINE_ALPHA);
    let mut y = 0;
    while y < pixmap.height() {
        if let Some(rect) = Rect::from_xywh(0.0, y as f32, width, 1.0) {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
        y += step;
    }
}

/// Random translucent horizontal bands, shifted sideways.
pub fn draw_glitch<R: Rng>(pixmap: &mut Pixmap, rng: &mut R, lines: usize) {
    let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
    for _ in 0..lines {
        if !rng.gen_bool(GLITCH_BAND_CHANCE) {
            continue;
        }
        let y = range(rng, 0.0, h);
        let band = range(rng, 4.0, 16.0);
        let shift = range(rng, -20.0, 20.0);
        let r = range(rng, 120.0, 255.0) as u8;
        let g = range(rng, 60.0, 255.0) as u8;
        if let Some(rect) = Rect::from_xywh(shift, y, w, band) {
            pixmap.fill_rect(
                rect,
                &solid_paint([r, g, 255], GLITCH_BAND_ALPHA),
                Transform::identity(),
                None,
            );
        }
    }
}

/// Streaks running left to right with a small vertical slant.
pub fn draw_speed_lines<R: Rng>(pixmap: &mut Pixmap, rng: &mut R, lines: usize) {
    let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
    for _ in 0..lines {
        let rgb = if rng.gen_bool(0.25) {
            [255, 236, 163]
        } else {
            [255, 255, 255]
        };
        let stroke = Stroke {
            width: range(rng, 1.4, 4.2),
            line_cap: LineCap::Butt,
            ..Stroke::default()
        };
        let y = range(rng, 0.0, h);
        let len = range(rng, 90.0, 260.0);
        let start_x = range(rng, -120.0, w);
        let dy = range(rng, -14.0, 14.0);

        let mut pb = PathBuilder::new();
        pb.move_to(start_x, y);
        pb.line_to(start_x + len, y + dy);
        if let Some(path) = pb.finish() {
            let mut paint = solid_paint(rgb, SPEED_LINE_ALPHA);
            paint.anti_alias = true;
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }
}
