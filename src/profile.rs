//! Performance profiles and capability hints.
//!
//! A profile is picked by configuration, never by sniffing the device.

use serde::Deserialize;

use crate::stage::StillFormat;

/// Named profile presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileName {
    #[default]
    Standard,
    LowPower,
}

impl ProfileName {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "standard" => Some(ProfileName::Standard),
            "low_power" | "low" => Some(ProfileName::LowPower),
            _ => None,
        }
    }
}

/// Colour grade applied while sampling into the tiny buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorGrade {
    pub brightness: f32,
    pub saturate: f32,
    pub contrast: f32,
}

/// Tuning constants for the render loop, effects and export.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceProfile {
    pub name: ProfileName,
    pub target_fps: u32,
    pub max_particles: usize,
    pub burst_count: usize,
    pub spark_spawn_max: usize,
    pub confetti_spawn_max: usize,
    pub glitch_lines: usize,
    pub speed_lines: usize,
    pub scanline_step: u32,
    pub resize_debounce_ms: u64,
    pub export_capture_fps: u32,
    pub export_bitrate: u32,
    pub compose_bitrate: u32,
    pub max_stage_width_portrait: u32,
    pub max_stage_width_landscape: u32,
    pub image_format: StillFormat,
    pub image_quality: f32,
    pub grade: ColorGrade,
    /// Alpha of the warm tint drawn over the upscaled stage
    pub warm_tint_alpha: f32,
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self::standard()
    }
}

impl PerformanceProfile {
    pub fn standard() -> Self {
        Self {
            name: ProfileName::Standard,
            target_fps: 30,
            max_particles: 640,
            burst_count: 24,
            spark_spawn_max: 3,
            confetti_spawn_max: 3,
            glitch_lines: 10,
            speed_lines: 34,
            scanline_step: 4,
            resize_debounce_ms: 80,
            export_capture_fps: 30,
            export_bitrate: 2_500_000,
            compose_bitrate: 2_200_000,
            max_stage_width_portrait: 760,
            max_stage_width_landscape: 760,
            image_format: StillFormat::Png,
            image_quality: 0.95,
            grade: ColorGrade {
                brightness: 1.14,
                saturate: 1.2,
                contrast: 1.06,
            },
            warm_tint_alpha: 0.10,
        }
    }

    pub fn low_power() -> Self {
        Self {
            name: ProfileName::LowPower,
            target_fps: 20,
            max_particles: 150,
            burst_count: 8,
            spark_spawn_max: 1,
            confetti_spawn_max: 1,
            glitch_lines: 4,
            speed_lines: 8,
            scanline_step: 9,
            resize_debounce_ms: 180,
            export_capture_fps: 16,
            export_bitrate: 1_150_000,
            compose_bitrate: 1_050_000,
            max_stage_width_portrait: 560,
            max_stage_width_landscape: 660,
            image_format: StillFormat::Jpeg,
            image_quality: 0.88,
            grade: ColorGrade {
                brightness: 1.13,
                saturate: 1.18,
                contrast: 1.06,
            },
            warm_tint_alpha: 0.09,
        }
    }

    pub fn from_name(name: ProfileName) -> Self {
        match name {
            ProfileName::Standard => Self::standard(),
            ProfileName::LowPower => Self::low_power(),
        }
    }

    pub fn is_low_power(&self) -> bool {
        self.name == ProfileName::LowPower
    }

    /// Minimum spacing between accepted frames.
    pub fn frame_budget_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1) as f64
    }
}

/// What the host can do, used for the startup hint and capture guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub live_camera: bool,
    pub recorder: bool,
    pub capture_stream: bool,
    pub secure_context: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            live_camera: true,
            recorder: true,
            capture_stream: true,
            secure_context: true,
        }
    }
}

impl Capabilities {
    pub fn can_record(&self) -> bool {
        self.recorder && self.capture_stream
    }

    /// One-line hint listing what is missing.
    pub fn hint(&self) -> String {
        let mut tags = Vec::new();
        if !self.secure_context {
            tags.push("not a secure context");
        }
        if !self.can_record() {
            tags.push("no video recording");
        }
        if tags.is_empty() {
            "Hint: tap the shutter for a photo, hold it to record".to_string()
        } else {
            format!("Hint: {}", tags.join(" · "))
        }
    }
}
