//! Text overlays: floating captions that drift and fade, sticky ones that
//! stay put, and the drag gesture that pins and moves them.

use std::collections::VecDeque;

use rand::Rng;
use tiny_skia::Pixmap;

use super::style::TextStyleId;
use crate::text::{Rgba, TextPainter};

/// Maximum number of overlays kept. The oldest is evicted first.
pub const MAX_OVERLAYS: usize = 60;

/// Horizontal velocity decay applied every frame to floating overlays.
pub const VX_DECAY: f32 = 0.997;

/// Padding added around measured text for hit-testing.
const HIT_PAD: f32 = 10.0;

/// Drag clamp margins: left/right, top, bottom.
const DRAG_MARGIN_X: f32 = 20.0;
const DRAG_MARGIN_TOP: f32 = 30.0;
const DRAG_MARGIN_BOTTOM: f32 = 16.0;

/// How long an overlay lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lifespan {
    /// Sticky: never expires, never drifts
    Forever,
    /// Floating: expires once its age passes this many frames
    Frames(f32),
}

/// Axis-aligned hit box in stage pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitBox {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl HitBox {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub id: u64,
    pub text: String,
    /// Horizontal center
    pub x: f32,
    /// Baseline
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub age: u32,
    pub lifespan: Lifespan,
    pub font_size: f32,
    pub color: Rgba,
    pub style: TextStyleId,
    /// Recomputed every frame from the measured text
    pub hit: Option<HitBox>,
}

impl TextOverlay {
    pub fn is_sticky(&self) -> bool {
        self.lifespan == Lifespan::Forever
    }

    pub fn expired(&self) -> bool {
        match self.lifespan {
            Lifespan::Forever => false,
            Lifespan::Frames(max) => self.age as f32 > max,
        }
    }

    /// Opacity: 1 for sticky overlays, fading by remaining life otherwise.
    pub fn alpha(&self) -> f32 {
        match self.lifespan {
            Lifespan::Forever => 1.0,
            Lifespan::Frames(max) => (1.0 - self.age as f32 / max).max(0.0),
        }
    }

    /// Pin in place: sticky, motionless, age reset.
    pub fn pin(&mut self) {
        self.lifespan = Lifespan::Forever;
        self.vx = 0.0;
        self.vy = 0.0;
        self.age = 0;
    }
}

/// Placement for a new overlay. Unset fields are randomized by the engine.
#[derive(Debug, Clone, Default)]
pub struct OverlayOptions {
    pub sticky: Option<bool>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub font_size: Option<f32>,
    pub style: Option<TextStyleId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    overlay_id: u64,
    pointer_id: u32,
    offset_x: f32,
    offset_y: f32,
}

/// The overlay collection plus the in-flight drag.
#[derive(Debug, Clone)]
pub struct OverlaySet {
    items: VecDeque<TextOverlay>,
    next_id: u64,
    drag: Option<Drag>,
}

impl Default for OverlaySet {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            next_id: 1,
            drag: None,
        }
    }
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextOverlay> {
        self.items.iter()
    }

    pub fn get(&self, id: u64) -> Option<&TextOverlay> {
        self.items.iter().find(|o| o.id == id)
    }

    /// Insert an overlay, assigning the next id. Returns that id.
    pub fn insert(&mut self, mut overlay: TextOverlay) -> u64 {
        overlay.id = self.next_id;
        self.next_id += 1;
        let id = overlay.id;
        self.items.push_back(overlay);
        while self.items.len() > MAX_OVERLAYS {
            if let Some(evicted) = self.items.pop_front() {
                if self.drag.is_some_and(|d| d.overlay_id == evicted.id) {
                    self.drag = None;
                }
            }
        }
        id
    }

    /// Remove every overlay and cancel any drag. Ids keep counting up.
    pub fn clear(&mut self) {
        self.items.clear();
        self.drag = None;
    }

    pub fn dragging(&self) -> Option<u64> {
        self.drag.map(|d| d.overlay_id)
    }

    /// Age, expire and move overlays, then refresh their hit boxes.
    pub fn advance(&mut self, painter: &TextPainter) {
        let dragged = self.dragging();
        self.items.retain_mut(|o| {
            o.age = o.age.saturating_add(1);
            if o.expired() {
                return false;
            }
            if !o.is_sticky() && dragged != Some(o.id) {
                o.x += o.vx;
                o.y += o.vy;
                o.vx *= VX_DECAY;
            }
            let w = painter.measure(&o.text, o.font_size.floor());
            let h = o.font_size;
            o.hit = Some(HitBox {
                left: o.x - w / 2.0 - HIT_PAD,
                right: o.x + w / 2.0 + HIT_PAD,
                top: o.y - h - HIT_PAD,
                bottom: o.y + HIT_PAD,
            });
            true
        });
    }

    /// Draw every overlay in insertion order. Shake jitter is drawn fresh here.
    pub fn render<R: Rng>(&self, pixmap: &mut Pixmap, painter: &TextPainter, rng: &mut R) {
        for o in &self.items {
            let (jx, jy) = o.style.jitter(rng);
            let look = o.style.look(o.color);
            painter.draw(
                pixmap,
                &o.text,
                o.font_size.floor(),
                o.x + jx,
                o.y + jy,
                &look,
                o.alpha(),
            );
        }
    }

    /// Topmost overlay whose last hit box contains the point.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<u64> {
        self.items
            .iter()
            .rev()
            .find(|o| o.hit.is_some_and(|h| h.contains(x, y)))
            .map(|o| o.id)
    }

    /// Start dragging whatever is under the pointer. The overlay is pinned sticky.
    pub fn begin_drag(&mut self, pointer_id: u32, x: f32, y: f32) -> Option<u64> {
        let id = self.hit_test(x, y)?;
        let overlay = self.items.iter_mut().find(|o| o.id == id)?;
        overlay.pin();
        self.drag = Some(Drag {
            overlay_id: id,
            pointer_id,
            offset_x: x - overlay.x,
            offset_y: y - overlay.y,
        });
        Some(id)
    }

    /// Move the dragged overlay, clamped inside the stage margins.
    pub fn drag_to(&mut self, pointer_id: u32, x: f32, y: f32, stage_w: f32, stage_h: f32) -> bool {
        let Some(drag) = self.drag.filter(|d| d.pointer_id == pointer_id) else {
            return false;
        };
        let Some(overlay) = self.items.iter_mut().find(|o| o.id == drag.overlay_id) else {
            return false;
        };
        overlay.x = (x - drag.offset_x).min(stage_w - DRAG_MARGIN_X).max(DRAG_MARGIN_X);
        overlay.y = (y - drag.offset_y).min(stage_h - DRAG_MARGIN_BOTTOM).max(DRAG_MARGIN_TOP);
        true
    }

    /// Finish the drag held by `pointer_id`. Returns true if one ended.
    pub fn end_drag(&mut self, pointer_id: u32) -> bool {
        if self.drag.is_some_and(|d| d.pointer_id == pointer_id) {
            self.drag = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(sticky: bool, x: f32, y: f32) -> TextOverlay {
        TextOverlay {
            id: 0,
            text: "yay".into(),
            x,
            y,
            vx: if sticky { 0.0 } else { 0.3 },
            vy: if sticky { 0.0 } else { -1.0 },
            age: 0,
            lifespan: if sticky { Lifespan::Forever } else { Lifespan::Frames(150.0) },
            font_size: 32.0,
            color: Rgba::hex(0xffffff),
            style: TextStyleId::Classic,
            hit: None,
        }
    }

    #[test]
    fn test_ids_are_unique_and_monotonic() {
        let mut set = OverlaySet::new();
        let a = set.insert(overlay(true, 100.0, 100.0));
        let b = set.insert(overlay(true, 100.0, 100.0));
        set.clear();
        let c = set.insert(overlay(true, 100.0, 100.0));
        assert!(a < b && b < c);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut set = OverlaySet::new();
        for _ in 0..(MAX_OVERLAYS + 5) {
            set.insert(overlay(true, 50.0, 50.0));
        }
        assert_eq!(set.len(), MAX_OVERLAYS);
        assert_eq!(set.iter().next().unwrap().id, 6);
    }

    #[test]
    fn test_floating_overlay_drifts_decays_and_expires() {
        let painter = TextPainter::new();
        let mut set = OverlaySet::new();
        set.insert(overlay(false, 100.0, 300.0));
        let mut last_vx = f32::MAX;
        for _ in 0..150 {
            set.advance(&painter);
            let o = set.iter().next().unwrap();
            assert!(o.vy < 0.0);
            assert!(o.vx.abs() <= last_vx);
            last_vx = o.vx.abs();
        }
        assert!(set.iter().next().unwrap().y < 300.0);
        set.advance(&painter);
        assert!(set.is_empty());
    }

    #[test]
    fn test_sticky_overlay_never_moves() {
        let painter = TextPainter::new();
        let mut set = OverlaySet::new();
        set.insert(overlay(true, 120.0, 200.0));
        for _ in 0..1_000 {
            set.advance(&painter);
        }
        let o = set.iter().next().unwrap();
        assert_eq!((o.x, o.y), (120.0, 200.0));
        assert_eq!(o.alpha(), 1.0);
    }

    #[test]
    fn test_hit_box_tracks_measured_text() {
        let painter = TextPainter::new();
        let mut set = OverlaySet::new();
        set.insert(overlay(true, 150.0, 200.0));
        set.advance(&painter);
        let hit = set.iter().next().unwrap().hit.unwrap();
        let w = painter.measure("yay", 32.0);
        assert!((hit.right - hit.left - (w + 20.0)).abs() < 1e-3);
        assert_eq!(hit.top, 200.0 - 32.0 - 10.0);
        assert_eq!(hit.bottom, 210.0);
    }

    #[test]
    fn test_drag_pins_moves_and_clamps() {
        let painter = TextPainter::new();
        let mut set = OverlaySet::new();
        let id = set.insert(overlay(false, 150.0, 200.0));
        set.advance(&painter);
        let o = set.get(id).unwrap().clone();

        assert_eq!(set.begin_drag(1, o.x + 5.0, o.y - 5.0), Some(id));
        assert!(set.get(id).unwrap().is_sticky());
        assert_eq!(set.get(id).unwrap().vx, 0.0);

        // a different pointer cannot move it
        assert!(!set.drag_to(2, 10.0, 10.0, 320.0, 426.0));
        assert!(set.drag_to(1, 105.0, 95.0, 320.0, 426.0));
        let moved = set.get(id).unwrap();
        assert!((moved.x - 100.0).abs() < 1e-3);
        assert!((moved.y - 100.0).abs() < 1e-3);

        assert!(set.drag_to(1, -500.0, 5_000.0, 320.0, 426.0));
        let clamped = set.get(id).unwrap();
        assert_eq!(clamped.x, 20.0);
        assert_eq!(clamped.y, 410.0);

        assert!(set.end_drag(1));
        assert!(!set.end_drag(1));
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let painter = TextPainter::new();
        let mut set = OverlaySet::new();
        set.insert(overlay(true, 150.0, 200.0));
        let top = set.insert(overlay(true, 150.0, 200.0));
        set.advance(&painter);
        assert_eq!(set.hit_test(150.0, 190.0), Some(top));
        assert_eq!(set.hit_test(0.0, 0.0), None);
    }
}
