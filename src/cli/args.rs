//! CLI argument parsing with clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{Effect, Profile, Style};

/// Pixel-art camera booth: compose, snap and record with effects
#[derive(Parser, Debug)]
#[command(name = "facelab")]
#[command(version, about = "Pixelated camera booth with stickers and effects", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose the stage and take a photo
    Snap {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Hold the shutter to record a clip, then save it
    Clip {
        #[command(flatten)]
        common: CommonArgs,

        /// Recording length in seconds (capped by the record limit)
        #[arg(long, default_value = "3")]
        seconds: f32,
    },
    /// List the recorder formats the local FFmpeg can produce
    Formats,
    /// Print the preset text phrases
    Phrases,
}

/// Options shared by the capture commands.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Screen effect
    #[arg(long, short)]
    pub effect: Option<Effect>,

    /// Text overlay style
    #[arg(long, short)]
    pub style: Option<Style>,

    /// Add a sticky text overlay (repeatable)
    #[arg(long, short)]
    pub text: Vec<String>,

    /// Add a random preset phrase
    #[arg(long)]
    pub preset_text: bool,

    /// Performance profile
    #[arg(long, short)]
    pub profile: Option<Profile>,

    /// Directory finished captures are saved to
    #[arg(long, short)]
    pub out_dir: Option<PathBuf>,

    /// Use an image or video file instead of the camera
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Fixed seed for the effect randomness
    #[arg(long)]
    pub seed: Option<u64>,
}
