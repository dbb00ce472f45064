//! CLI enum types for effect, text style and profile options.

use clap::ValueEnum;

use crate::effects::{EffectId, TextStyleId};
use crate::profile::ProfileName;

/// Screen effect preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Effect {
    #[default]
    None,
    Spark,
    Heart,
    Glitch,
    Confetti,
    Speed,
}

impl From<Effect> for EffectId {
    fn from(e: Effect) -> Self {
        match e {
            Effect::None => EffectId::None,
            Effect::Spark => EffectId::Spark,
            Effect::Heart => EffectId::Heart,
            Effect::Glitch => EffectId::Glitch,
            Effect::Confetti => EffectId::Confetti,
            Effect::Speed => EffectId::Speed,
        }
    }
}

/// Text overlay style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Style {
    #[default]
    Classic,
    Neon,
    Fire,
    Candy,
    Shake,
}

impl From<Style> for TextStyleId {
    fn from(s: Style) -> Self {
        match s {
            Style::Classic => TextStyleId::Classic,
            Style::Neon => TextStyleId::Neon,
            Style::Fire => TextStyleId::Fire,
            Style::Candy => TextStyleId::Candy,
            Style::Shake => TextStyleId::Shake,
        }
    }
}

/// Performance profile preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    Standard,
    LowPower,
}

impl From<Profile> for ProfileName {
    fn from(p: Profile) -> Self {
        match p {
            Profile::Standard => ProfileName::Standard,
            Profile::LowPower => ProfileName::LowPower,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_to_effect_id() {
        assert_eq!(EffectId::from(Effect::None), EffectId::None);
        assert_eq!(EffectId::from(Effect::Heart), EffectId::Heart);
        assert_eq!(EffectId::from(Effect::Speed), EffectId::Speed);
    }

    #[test]
    fn test_style_to_text_style_id() {
        assert_eq!(TextStyleId::from(Style::Classic), TextStyleId::Classic);
        assert_eq!(TextStyleId::from(Style::Shake), TextStyleId::Shake);
    }

    #[test]
    fn test_profile_to_profile_name() {
        assert_eq!(ProfileName::from(Profile::LowPower), ProfileName::LowPower);
        assert_eq!(ProfileName::from(Profile::Standard), ProfileName::Standard);
    }

    #[test]
    fn test_value_names_match_display() {
        for effect in Effect::value_variants() {
            let name = effect.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(EffectId::from(*effect).to_string(), name);
        }
    }
}
