//! Configuration file handling for facelab.
//!
//! Loads configuration from `<config dir>/facelab/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::profile::{PerformanceProfile, ProfileName};
use crate::session::SessionTimings;
use crate::source::{Facing, FfmpegDevices};

/// Configuration file structure for facelab.
/// Loaded from the user config dir (or a custom path via --config).
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Profile preset plus optional per-constant overrides.
#[derive(Debug, Deserialize, Default)]
pub struct ProfileConfig {
    #[serde(default)]
    pub name: ProfileName,
    pub target_fps: Option<u32>,
    pub max_particles: Option<usize>,
    pub export_capture_fps: Option<u32>,
    pub export_bitrate: Option<u32>,
    pub compose_bitrate: Option<u32>,
    pub resize_debounce_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,
    #[serde(default = "default_record_max_ms")]
    pub record_max_ms: u64,
    #[serde(default = "default_saved_ack_ms")]
    pub saved_ack_ms: u64,
    #[serde(default = "default_save_freeze_ms")]
    pub save_freeze_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            long_press_ms: default_long_press_ms(),
            record_max_ms: default_record_max_ms(),
            saved_ack_ms: default_saved_ack_ms(),
            save_freeze_ms: default_save_freeze_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct StageConfig {
    /// Index into the pixel level table. Defaults to 1 (0 on tablets).
    #[serde(default)]
    pub pixel_level: Option<usize>,
    #[serde(default)]
    pub tablet: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct TextConfig {
    /// TTF/OTF font used for overlays
    #[serde(default)]
    pub font: Option<PathBuf>,
    /// Replaces the bundled preset phrases when non-empty
    #[serde(default)]
    pub phrases: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub facing: Facing,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub microphone: Option<String>,
    #[serde(default = "default_true")]
    pub mirror: bool,
    #[serde(default = "default_true")]
    pub secure_context: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            facing: Facing::User,
            camera: None,
            microphone: None,
            mirror: true,
            secure_context: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Download directory (default: the user's download dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Command that receives the saved file path, e.g. `xdg-open`
    #[serde(default)]
    pub share_command: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_long_press_ms() -> u64 {
    SessionTimings::default().long_press_ms
}

fn default_record_max_ms() -> u64 {
    SessionTimings::default().record_max_ms
}

fn default_saved_ack_ms() -> u64 {
    SessionTimings::default().saved_ack_ms
}

fn default_save_freeze_ms() -> u64 {
    SessionTimings::default().save_freeze_ms
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            Self::parse(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })
        } else {
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The configured profile with its overrides applied.
    pub fn performance_profile(&self) -> PerformanceProfile {
        let p = &self.profile;
        let mut profile = PerformanceProfile::from_name(p.name);
        if let Some(fps) = p.target_fps {
            profile.target_fps = fps.max(1);
        }
        if let Some(max) = p.max_particles {
            profile.max_particles = max;
        }
        if let Some(fps) = p.export_capture_fps {
            profile.export_capture_fps = fps.max(1);
        }
        if let Some(bits) = p.export_bitrate {
            profile.export_bitrate = bits;
        }
        if let Some(bits) = p.compose_bitrate {
            profile.compose_bitrate = bits;
        }
        if let Some(ms) = p.resize_debounce_ms {
            profile.resize_debounce_ms = ms;
        }
        profile
    }

    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            long_press_ms: self.capture.long_press_ms,
            record_max_ms: self.capture.record_max_ms,
            saved_ack_ms: self.capture.saved_ack_ms,
            save_freeze_ms: self.capture.save_freeze_ms,
            ..SessionTimings::default()
        }
    }

    pub fn pixel_level(&self) -> usize {
        self.stage
            .pixel_level
            .unwrap_or(if self.stage.tablet { 0 } else { 1 })
    }

    /// FFmpeg device targets, platform defaults where unset.
    pub fn devices(&self) -> FfmpegDevices {
        let mut devices = FfmpegDevices::default();
        if let Some(camera) = &self.device.camera {
            devices.camera = camera.clone();
        }
        if let Some(mic) = &self.device.microphone {
            devices.microphone = mic.clone();
        }
        devices.mirror = self.device.mirror;
        devices
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("facelab").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/facelab/config.toml")
        })
}
