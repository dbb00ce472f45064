//! Pixelation compositor: center-crop, average into a tiny buffer, then
//! upscale onto the stage with nearest-neighbour sampling.

use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::profile::{ColorGrade, PerformanceProfile};
use crate::source::Frame;
use crate::stage::Stage;

/// Base pixel sizes the user can pick from.
pub const PIXEL_LEVELS: [f32; 4] = [2.0, 3.0, 4.0, 5.0];

/// Default index into [`PIXEL_LEVELS`] (tablets default to 0).
pub const DEFAULT_PIXEL_INDEX: usize = 1;

/// The tiny buffer never shrinks below this.
pub const MIN_TINY_SIZE: (u32, u32) = (24, 32);

const WARM_TINT: [u8; 3] = [255, 223, 190];
const WHITE_LIFT_ALPHA: f32 = 0.04;

/// Preview pixel factor for a level index.
pub fn preview_pixel_factor(index: usize, tablet: bool) -> f32 {
    let base = PIXEL_LEVELS[index.min(PIXEL_LEVELS.len() - 1)];
    if tablet {
        (base * 0.68).max(1.45)
    } else {
        (base * 0.76).max(1.5)
    }
}

/// Tiny buffer size for a target and pixel factor.
pub fn tiny_size(target_w: u32, target_h: u32, factor: f32) -> (u32, u32) {
    let w = (target_w as f32 / factor).floor() as u32;
    let h = (target_h as f32 / factor).floor() as u32;
    (w.max(MIN_TINY_SIZE.0), h.max(MIN_TINY_SIZE.1))
}

/// Source rectangle to sample from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Center crop matching the target aspect ratio. The longer axis is cropped.
pub fn center_crop(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> CropRect {
    let src_ratio = src_w as f64 / src_h as f64;
    let dst_ratio = dst_w as f64 / dst_h as f64;
    let mut crop = CropRect {
        x: 0,
        y: 0,
        width: src_w,
        height: src_h,
    };
    if src_ratio > dst_ratio {
        crop.width = ((src_h as f64 * dst_ratio).floor() as u32).clamp(1, src_w);
        crop.x = (src_w - crop.width) / 2;
    } else if src_ratio < dst_ratio {
        crop.height = ((src_w as f64 / dst_ratio).floor() as u32).clamp(1, src_h);
        crop.y = (src_h - crop.height) / 2;
    }
    crop
}

/// Apply brightness, then saturation, then contrast to one pixel.
pub fn grade_pixel(rgb: [u8; 3], grade: &ColorGrade) -> [u8; 3] {
    let b = grade.brightness;
    let [r, g, bl] = rgb.map(|c| (c as f32 / 255.0 * b).min(1.0));

    let s = grade.saturate;
    let sr = (0.213 + 0.787 * s) * r + (0.715 - 0.715 * s) * g + (0.072 - 0.072 * s) * bl;
    let sg = (0.213 - 0.213 * s) * r + (0.715 + 0.285 * s) * g + (0.072 - 0.072 * s) * bl;
    let sb = (0.213 - 0.213 * s) * r + (0.715 - 0.715 * s) * g + (0.072 + 0.928 * s) * bl;

    let k = grade.contrast;
    [sr, sg, sb].map(|c| {
        let c = c.clamp(0.0, 1.0);
        (((c - 0.5) * k + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
    })
}

/// Average `crop` of `frame` into `out_w * out_h` RGB cells.
fn downsample_crop_into(frame: &Frame, crop: CropRect, out_w: u32, out_h: u32, buffer: &mut Vec<[u8; 3]>) {
    buffer.clear();
    buffer.reserve(out_w as usize * out_h as usize);

    let bpp = frame.bytes_per_pixel();
    let cell_w = crop.width as f32 / out_w as f32;
    let cell_h = crop.height as f32 / out_h as f32;
    let crop_right = crop.x + crop.width;
    let crop_bottom = crop.y + crop.height;

    for ty in 0..out_h {
        let start_y = crop.y + (ty as f32 * cell_h) as u32;
        let end_y = (crop.y + ((ty + 1) as f32 * cell_h) as u32).max(start_y + 1).min(crop_bottom);
        for tx in 0..out_w {
            let start_x = crop.x + (tx as f32 * cell_w) as u32;
            let end_x = (crop.x + ((tx + 1) as f32 * cell_w) as u32).max(start_x + 1).min(crop_right);

            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for py in start_y..end_y {
                let row = py as usize * frame.width as usize;
                for px in start_x..end_x {
                    let idx = (row + px as usize) * bpp;
                    if let Some(p) = frame.data.get(idx..idx + 3) {
                        sum[0] += p[0] as u32;
                        sum[1] += p[1] as u32;
                        sum[2] += p[2] as u32;
                        count += 1;
                    }
                }
            }
            buffer.push(if count > 0 {
                [
                    (sum[0] / count) as u8,
                    (sum[1] / count) as u8,
                    (sum[2] / count) as u8,
                ]
            } else {
                [0, 0, 0]
            });
        }
    }
}

/// Draws sources onto the stage with the blocky "toy camera" look.
pub struct Compositor {
    pixel_factor: f32,
    grade: ColorGrade,
    warm_tint_alpha: f32,
    tiny: Option<Pixmap>,
    cells: Vec<[u8; 3]>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("pixel_factor", &self.pixel_factor)
            .field("tiny", &self.tiny_size())
            .finish()
    }
}

impl Compositor {
    pub fn new(profile: &PerformanceProfile, pixel_index: usize, tablet: bool) -> Self {
        Self {
            pixel_factor: preview_pixel_factor(pixel_index, tablet),
            grade: profile.grade,
            warm_tint_alpha: profile.warm_tint_alpha,
            tiny: None,
            cells: Vec::new(),
        }
    }

    pub fn set_pixel_level(&mut self, index: usize, tablet: bool) {
        self.pixel_factor = preview_pixel_factor(index, tablet);
    }

    pub fn pixel_factor(&self) -> f32 {
        self.pixel_factor
    }

    /// Size of the tiny buffer after the last compose.
    pub fn tiny_size(&self) -> Option<(u32, u32)> {
        self.tiny.as_ref().map(|p| (p.width(), p.height()))
    }

    /// Draw `source` over the whole stage. Returns false if the source has no pixels yet.
    pub fn compose(&mut self, source: &Frame, stage: &mut Stage) -> bool {
        let Some((src_w, src_h)) = source.natural_size() else {
            return false;
        };
        let (target_w, target_h) = (stage.width(), stage.height());
        let crop = center_crop(src_w, src_h, target_w, target_h);
        let (tiny_w, tiny_h) = tiny_size(target_w, target_h, self.pixel_factor);

        if self.tiny_size() != Some((tiny_w, tiny_h)) {
            self.tiny = Pixmap::new(tiny_w, tiny_h);
        }
        let Some(tiny) = self.tiny.as_mut() else {
            return false;
        };

        downsample_crop_into(source, crop, tiny_w, tiny_h, &mut self.cells);
        // Opaque pixels, so premultiplied and straight RGBA are the same bytes.
        for (dst, rgb) in tiny.data_mut().chunks_exact_mut(4).zip(&self.cells) {
            let [r, g, b] = grade_pixel(*rgb, &self.grade);
            dst.copy_from_slice(&[r, g, b, 255]);
        }

        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_scale(
            target_w as f32 / tiny_w as f32,
            target_h as f32 / tiny_h as f32,
        );
        stage
            .pixmap_mut()
            .draw_pixmap(0, 0, tiny.as_ref(), &paint, transform, None);

        stage.wash(WARM_TINT, self.warm_tint_alpha);
        stage.wash([255, 255, 255], WHITE_LIFT_ALPHA);
        true
    }
}
