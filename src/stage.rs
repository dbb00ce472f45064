//! The visible 2D stage: a portrait pixmap every layer draws into.

use std::io::Cursor;

use image::{ExtendedColorType, ImageEncoder};
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

use crate::blob::MediaBlob;
use crate::profile::PerformanceProfile;
use crate::source::{Frame, FrameFormat};

/// Smallest stage width ever produced by fitting.
pub const MIN_STAGE_WIDTH: u32 = 320;

/// Width cap for phones and desktops.
pub const MAX_STAGE_WIDTH: u32 = 760;

/// Background drawn before the source.
pub const BACKGROUND: [u8; 3] = [0xb8, 0xd3, 0xec];

/// Fill used when no source could be drawn.
pub const PLACEHOLDER: [u8; 3] = [0xa7, 0xc4, 0xdf];

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid stage size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("still encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Still image container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillFormat {
    Png,
    Jpeg,
}

impl StillFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            StillFormat::Png => "image/png",
            StillFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Space available to the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Inner width of the stage's container
    pub container_width: u32,
    /// Height of the whole window
    pub window_height: u32,
    pub landscape: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            container_width: 800,
            window_height: 1200,
            landscape: false,
        }
    }
}

/// Compute a 3:4 portrait stage size for a viewport.
///
/// Width is even and never below [`MIN_STAGE_WIDTH`].
pub fn fit_stage(viewport: Viewport, profile: &PerformanceProfile, tablet: bool) -> (u32, u32) {
    let landscape = tablet && viewport.landscape;
    let height_share = if landscape { 0.68 } else { 0.72 };
    let max_height = (viewport.window_height as f64 * height_share).floor() as u32;
    let max_width_by_height = max_height * 3 / 4;
    let cap = match (tablet, landscape) {
        (true, true) => profile.max_stage_width_landscape,
        (true, false) => profile.max_stage_width_portrait,
        _ => MAX_STAGE_WIDTH,
    };
    let width = viewport
        .container_width
        .saturating_sub(20)
        .min(cap)
        .min(max_width_by_height)
        .max(MIN_STAGE_WIDTH);
    let even = width - width % 2;
    (even, even * 4 / 3)
}

pub(crate) fn solid_paint(rgb: [u8; 3], alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(
        rgb[0],
        rgb[1],
        rgb[2],
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
    ));
    paint.anti_alias = false;
    paint
}

/// The drawing surface.
pub struct Stage {
    pixmap: Pixmap,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Stage {
    pub fn new(width: u32, height: u32) -> Result<Self, StageError> {
        let pixmap = Pixmap::new(width, height).ok_or(StageError::InvalidSize { width, height })?;
        let mut stage = Self { pixmap };
        stage.fill(BACKGROUND);
        Ok(stage)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Reallocate at a new size. Contents are cleared to the background.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), StageError> {
        if width == self.width() && height == self.height() {
            return Ok(());
        }
        *self = Self::new(width, height)?;
        Ok(())
    }

    /// Opaque fill of the whole stage.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        self.pixmap.fill(Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255));
    }

    /// Translucent fill of the whole stage.
    pub fn wash(&mut self, rgb: [u8; 3], alpha: f32) {
        let (w, h) = (self.width() as f32, self.height() as f32);
        self.fill_rect(0.0, 0.0, w, h, rgb, alpha);
    }

    /// Fill a rectangle, silently skipping degenerate ones.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: [u8; 3], alpha: f32) {
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            self.pixmap
                .fill_rect(rect, &solid_paint(rgb, alpha), Transform::identity(), None);
        }
    }

    /// Straight-alpha RGBA copy of the stage.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixmap.data().len());
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    /// Opaque RGB snapshot, used as a capture-stream frame.
    pub fn snapshot(&self) -> Frame {
        let mut data = Vec::with_capacity(self.width() as usize * self.height() as usize * 3);
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue()]);
        }
        Frame {
            data,
            width: self.width(),
            height: self.height(),
            format: FrameFormat::Rgb,
            timestamp: std::time::Instant::now(),
        }
    }

    /// Serialize the stage as a still image blob.
    ///
    /// `quality` is in `0.0..=1.0` and only affects JPEG.
    pub fn to_blob(&self, format: StillFormat, quality: f32) -> Result<MediaBlob, StageError> {
        let (width, height) = (self.width(), self.height());
        let mut cursor = Cursor::new(Vec::new());
        match format {
            StillFormat::Png => {
                image::codecs::png::PngEncoder::new(&mut cursor).write_image(
                    &self.to_rgba(),
                    width,
                    height,
                    ExtendedColorType::Rgba8,
                )?;
            }
            StillFormat::Jpeg => {
                let q = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
                let snapshot = self.snapshot();
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, q).write_image(
                    &snapshot.data,
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )?;
            }
        }
        Ok(MediaBlob::new(format.mime(), cursor.into_inner()))
    }
}
