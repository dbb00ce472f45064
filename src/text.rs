//! Text measurement and styled text drawing.
//!
//! With a TTF font configured, glyphs are rasterized through `fontdue`.
//! Without one, text is measured heuristically and drawn as a sticker pill.
//! Either way the result is a coverage mask that gets a shadow, a stroke and
//! a fill layered into a small sprite before it is blended onto the stage.

use std::path::Path;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use tiny_skia::{Pixmap, PixmapPaint, Transform};

/// An sRGB colour with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    /// Opaque colour from `0xRRGGBB`.
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xff) as u8,
            g: ((rgb >> 8) & 0xff) as u8,
            b: (rgb & 0xff) as u8,
            a: 1.0,
        }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// How a run of text is painted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLook {
    pub fill: Rgba,
    pub stroke: Rgba,
    pub line_width: f32,
    /// Shadow colour and blur radius
    pub shadow: Option<(Rgba, f32)>,
}

#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error("failed to read font '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse font: {0}")]
    Font(String),
}

/// Measures and draws overlay text.
#[derive(Default)]
pub struct TextPainter {
    font: Option<Font>,
}

impl std::fmt::Debug for TextPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPainter")
            .field("font", &self.font.as_ref().and_then(|f| f.name()))
            .finish()
    }
}

struct Coverage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Coverage {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

impl TextPainter {
    /// Painter with heuristic metrics and pill glyphs.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_font_file(path: &Path) -> Result<Self, TextError> {
        let bytes = std::fs::read(path).map_err(|source| TextError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_font_bytes(bytes)
    }

    pub fn from_font_bytes(bytes: Vec<u8>) -> Result<Self, TextError> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| TextError::Font(e.to_string()))?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Advance width of `text` at `size` px.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match &self.font {
            Some(font) => text.chars().map(|c| font.metrics(c, size).advance_width).sum(),
            None => text.chars().map(|c| heuristic_advance(c, size)).sum(),
        }
    }

    /// Draw `text` centered on `x` with its baseline at `y`.
    pub fn draw(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        size: f32,
        x: f32,
        y: f32,
        look: &TextLook,
        alpha: f32,
    ) {
        if text.is_empty() || size <= 0.0 || alpha <= 0.0 {
            return;
        }
        let blur = look.shadow.map(|(_, b)| b).unwrap_or(0.0);
        let pad = (look.line_width + blur).ceil() as usize + 2;
        let width = self.measure(text, size).ceil() as usize;
        let (coverage, ascent) = match &self.font {
            Some(font) => glyph_coverage(font, text, size, width, pad),
            None => pill_coverage(size, width, pad),
        };

        let stroke = dilate(&coverage, (look.line_width / 2.0).round() as usize);
        let Some(sprite) = layer_sprite(&coverage, &stroke, look) else {
            return;
        };

        let left = (x - width as f32 / 2.0).round() as i32 - pad as i32;
        let top = (y - ascent).round() as i32 - pad as i32;
        let paint = PixmapPaint {
            opacity: alpha.clamp(0.0, 1.0),
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(left, top, sprite.as_ref(), &paint, Transform::identity(), None);
    }
}

fn heuristic_advance(c: char, size: f32) -> f32 {
    if c.is_whitespace() {
        size * 0.3
    } else if c as u32 >= 0x2e80 {
        // CJK and most emoji are roughly square
        size
    } else {
        size * 0.58
    }
}

fn glyph_coverage(font: &Font, text: &str, size: f32, width: usize, pad: usize) -> (Coverage, f32) {
    let (ascent, line_height) = font
        .horizontal_line_metrics(size)
        .map(|m| (m.ascent, m.new_line_size))
        .unwrap_or((size * 0.8, size * 1.2));
    let mut coverage = Coverage::new(width + pad * 2, line_height.ceil() as usize + pad * 2);

    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        x: pad as f32,
        y: pad as f32,
        ..LayoutSettings::default()
    });
    layout.append(&[font], &TextStyle::new(text, size, 0));

    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (_, bitmap) = font.rasterize_config(glyph.key);
        let gx = glyph.x.round() as i64;
        let gy = glyph.y.round() as i64;
        for row in 0..glyph.height {
            for col in 0..glyph.width {
                let (px, py) = (gx + col as i64, gy + row as i64);
                if px < 0 || py < 0 || px as usize >= coverage.width || py as usize >= coverage.height {
                    continue;
                }
                let v = bitmap[row * glyph.width + col] as f32 / 255.0;
                let idx = py as usize * coverage.width + px as usize;
                coverage.data[idx] = coverage.data[idx].max(v);
            }
        }
    }
    (coverage, ascent)
}

/// Rounded pill standing in for the glyph run.
fn pill_coverage(size: f32, width: usize, pad: usize) -> (Coverage, f32) {
    let ascent = size * 0.8;
    let height = ascent.ceil() as usize;
    let mut coverage = Coverage::new(width + pad * 2, height + pad * 2);
    let radius = height as f32 / 2.0;
    for y in 0..height {
        for x in 0..width {
            let cy = y as f32 + 0.5;
            let cx = x as f32 + 0.5;
            let dx = if cx < radius {
                radius - cx
            } else if cx > width as f32 - radius {
                cx - (width as f32 - radius)
            } else {
                0.0
            };
            let dy = (cy - radius).abs();
            let d = (dx * dx + dy * dy).sqrt();
            let v = (radius - d + 0.5).clamp(0.0, 1.0);
            coverage.data[(y + pad) * coverage.width + x + pad] = v;
        }
    }
    (coverage, ascent)
}

/// Separable max filter.
fn dilate(src: &Coverage, radius: usize) -> Coverage {
    if radius == 0 {
        return Coverage {
            width: src.width,
            height: src.height,
            data: src.data.clone(),
        };
    }
    let mut horizontal = Coverage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(src.width - 1);
            horizontal.data[y * src.width + x] = (lo..=hi).map(|i| src.at(i, y)).fold(0.0, f32::max);
        }
    }
    let mut out = Coverage::new(src.width, src.height);
    for y in 0..src.height {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(src.height - 1);
        for x in 0..src.width {
            out.data[y * src.width + x] = (lo..=hi).map(|j| horizontal.at(x, j)).fold(0.0, f32::max);
        }
    }
    out
}

/// Two-pass separable box blur.
fn blur(src: &Coverage, radius: usize) -> Coverage {
    let mut current = Coverage {
        width: src.width,
        height: src.height,
        data: src.data.clone(),
    };
    if radius == 0 {
        return current;
    }
    for _ in 0..2 {
        let mut horizontal = Coverage::new(src.width, src.height);
        for y in 0..src.height {
            for x in 0..src.width {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius).min(src.width - 1);
                let sum: f32 = (lo..=hi).map(|i| current.at(i, y)).sum();
                horizontal.data[y * src.width + x] = sum / (2 * radius + 1) as f32;
            }
        }
        let mut vertical = Coverage::new(src.width, src.height);
        for y in 0..src.height {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(src.height - 1);
            for x in 0..src.width {
                let sum: f32 = (lo..=hi).map(|j| horizontal.at(x, j)).sum();
                vertical.data[y * src.width + x] = sum / (2 * radius + 1) as f32;
            }
        }
        current = vertical;
    }
    current
}

/// Composite shadow, stroke and fill into a premultiplied sprite.
fn layer_sprite(fill: &Coverage, stroke: &Coverage, look: &TextLook) -> Option<Pixmap> {
    let mut sprite = Pixmap::new(fill.width as u32, fill.height as u32)?;
    let shadow = look
        .shadow
        .map(|(color, radius)| (color, blur(stroke, (radius / 2.0).round() as usize)));

    for (i, px) in sprite.data_mut().chunks_exact_mut(4).enumerate() {
        // straight-alpha accumulation, source-over
        let mut acc = [0.0f32; 3];
        let mut acc_a = 0.0f32;
        let mut over = |color: &Rgba, cov: f32| {
            let a = color.a * cov;
            if a <= 0.0 {
                return;
            }
            let out_a = a + acc_a * (1.0 - a);
            let rgb = [color.r, color.g, color.b];
            for c in 0..3 {
                let src = rgb[c] as f32 / 255.0;
                acc[c] = (src * a + acc[c] * acc_a * (1.0 - a)) / out_a;
            }
            acc_a = out_a;
        };
        if let Some((color, mask)) = &shadow {
            over(color, mask.data[i]);
        }
        over(&look.stroke, stroke.data[i]);
        over(&look.fill, fill.data[i]);

        let a = (acc_a.clamp(0.0, 1.0) * 255.0).round() as u8;
        for c in 0..3 {
            px[c] = ((acc[c] * acc_a).clamp(0.0, 1.0) * 255.0).round().min(a as f32) as u8;
        }
        px[3] = a;
    }
    Some(sprite)
}
