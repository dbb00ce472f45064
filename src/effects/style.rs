//! Text style presets for overlays.

use rand::Rng;

use super::range;
use crate::text::{Rgba, TextLook};

/// Text style applied to an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyleId {
    /// Overlay colour with a soft dark outline
    #[default]
    Classic,
    /// Cyan with a glowing blue shadow
    Neon,
    /// Warm yellow with an orange glow
    Fire,
    /// Pink with a thick white outline
    Candy,
    /// Pale yellow that jitters every frame
    Shake,
}

impl TextStyleId {
    pub const ALL: [TextStyleId; 5] = [
        TextStyleId::Classic,
        TextStyleId::Neon,
        TextStyleId::Fire,
        TextStyleId::Candy,
        TextStyleId::Shake,
    ];

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "classic" => Some(Self::Classic),
            "neon" => Some(Self::Neon),
            "fire" => Some(Self::Fire),
            "candy" => Some(Self::Candy),
            "shake" => Some(Self::Shake),
            _ => None,
        }
    }

    /// Stroke, fill and shadow for this style. `color` is the overlay's own colour.
    pub fn look(self, color: Rgba) -> TextLook {
        match self {
            Self::Neon => TextLook {
                fill: Rgba::hex(0x8df5ff),
                stroke: Rgba::rgba(11, 36, 61, 0.68),
                line_width: 4.0,
                shadow: Some((Rgba::hex(0x4dd8ff), 12.0)),
            },
            Self::Fire => TextLook {
                fill: Rgba::hex(0xffe08a),
                stroke: Rgba::rgba(80, 20, 0, 0.7),
                line_width: 5.0,
                shadow: Some((Rgba::hex(0xff5b2e), 12.0)),
            },
            Self::Candy => TextLook {
                fill: Rgba::hex(0xff7ab8),
                stroke: Rgba::rgba(255, 255, 255, 0.9),
                line_width: 6.0,
                shadow: Some((Rgba::hex(0xffc0df), 8.0)),
            },
            Self::Shake => TextLook {
                fill: Rgba::hex(0xfff3b0),
                stroke: Rgba::rgba(0, 0, 0, 0.42),
                line_width: 6.0,
                shadow: None,
            },
            Self::Classic => TextLook {
                fill: color,
                stroke: Rgba::rgba(0, 0, 0, 0.35),
                line_width: 6.0,
                shadow: None,
            },
        }
    }

    /// Positional jitter for this frame. Only `Shake` moves.
    pub fn jitter<R: Rng>(self, rng: &mut R) -> (f32, f32) {
        match self {
            Self::Shake => (range(rng, -1.8, 1.8), range(rng, -1.2, 1.2)),
            _ => (0.0, 0.0),
        }
    }
}

impl std::fmt::Display for TextStyleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classic => write!(f, "classic"),
            Self::Neon => write!(f, "neon"),
            Self::Fire => write!(f, "fire"),
            Self::Candy => write!(f, "candy"),
            Self::Shake => write!(f, "shake"),
        }
    }
}
