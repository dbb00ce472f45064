//! Subcommand handlers: session construction, capture scripts, formats
//! and phrases.

use std::error::Error;
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::args::CommonArgs;
use crate::blob::load_media;
use crate::capture::{mime_codecs, FfmpegRecorderBackend, RecorderBackend, MIME_PREFERENCES};
use crate::config::Config;
use crate::effects::{EffectId, TextStyleId};
use crate::event_loop::{self, Gesture, RunSummary, Script};
use crate::pipeline::ffmpeg_available;
use crate::profile::{Capabilities, PerformanceProfile};
use crate::save::{CommandShare, DownloadDir, ShareTarget, ShareThenDownload};
use crate::session::{Session, SessionDevices, SessionOptions, PRESET_PHRASES};
use crate::source::FfmpegDecoder;
use crate::status::LogStatus;
use crate::text::TextPainter;

/// Time given to the camera before the shutter is pressed.
const WARMUP_MS: u64 = 800;

/// Gap between shutter press and release for a tap.
const TAP_MS: u64 = 60;

/// Gap between the capture and "done".
const REVIEW_MS: u64 = 400;

/// Profile from the config with the CLI override applied.
pub fn resolve_profile(config: &Config, common: &CommonArgs) -> PerformanceProfile {
    match common.profile {
        Some(profile) => {
            let mut resolved = config.performance_profile();
            let preset = PerformanceProfile::from_name(profile.into());
            if resolved.name != preset.name {
                resolved = preset;
            }
            resolved
        }
        None => config.performance_profile(),
    }
}

/// Build a session on the FFmpeg devices, recorder and decoder.
pub fn build_session(config: &Config, common: &CommonArgs) -> Result<Session, Box<dyn Error>> {
    let profile = resolve_profile(config, common);
    let recorder = FfmpegRecorderBackend::probe();
    let capabilities = Capabilities {
        live_camera: ffmpeg_available(),
        recorder: recorder.is_supported(),
        capture_stream: true,
        secure_context: config.device.secure_context,
    };

    let out_dir = common
        .out_dir
        .clone()
        .or_else(|| config.output.dir.clone())
        .unwrap_or_else(DownloadDir::default_dir);
    let share = config
        .output
        .share_command
        .as_deref()
        .and_then(|cmd| CommandShare::parse(cmd, staging_dir()))
        .map(|share| Box::new(share) as Box<dyn ShareTarget>);
    log::info!("Saving to {}", out_dir.display());

    let painter = match &config.text.font {
        Some(path) => TextPainter::from_font_file(path)?,
        None => TextPainter::new(),
    };
    let phrases = if config.text.phrases.is_empty() {
        PRESET_PHRASES.iter().map(|p| p.to_string()).collect()
    } else {
        config.text.phrases.clone()
    };

    let options = SessionOptions {
        profile,
        timings: config.timings(),
        capabilities,
        facing: config.device.facing,
        tablet: config.stage.tablet,
        pixel_level: config.pixel_level(),
        phrases,
        seed: common.seed,
        ..SessionOptions::default()
    };
    let devices = SessionDevices {
        provider: Box::new(config.devices()),
        recorder: Box::new(recorder),
        decoder: Box::new(FfmpegDecoder),
        sink: Box::new(ShareThenDownload::new(share, Some(DownloadDir::new(out_dir)))),
        status: Box::new(LogStatus),
        painter,
    };
    Ok(Session::new(options, devices)?)
}

fn staging_dir() -> PathBuf {
    std::env::temp_dir().join("facelab")
}

/// Import, effect, style and text gestures shared by both scripts.
fn setup_script(common: &CommonArgs) -> std::io::Result<Script> {
    let mut script = Script::new();
    if let Some(path) = &common.input {
        let (blob, kind) = load_media(path)?;
        script = script.then(0, Gesture::Import(blob, kind));
    }
    if let Some(effect) = common.effect {
        script = script.then(0, Gesture::SelectEffect(EffectId::from(effect)));
    }
    if let Some(style) = common.style {
        script = script.then(0, Gesture::SelectStyle(TextStyleId::from(style)));
    }
    for text in &common.text {
        script = script.then(0, Gesture::AddText(text.clone()));
    }
    if common.preset_text {
        script = script.then(0, Gesture::AddPresetText);
    }
    Ok(script)
}

/// Tap the shutter after a warm-up, then press done.
pub fn snap_script(common: &CommonArgs) -> std::io::Result<Script> {
    Ok(setup_script(common)?
        .then(WARMUP_MS, Gesture::ShutterDown)
        .then(TAP_MS, Gesture::ShutterUp)
        .then(REVIEW_MS, Gesture::Done))
}

/// Hold the shutter for `seconds` (at least past the long-press threshold),
/// then press done, which stops and saves.
pub fn clip_script(common: &CommonArgs, seconds: f32, long_press_ms: u64) -> std::io::Result<Script> {
    let hold_ms = ((seconds.max(0.0) * 1000.0) as u64).max(long_press_ms + 100);
    Ok(setup_script(common)?
        .then(WARMUP_MS, Gesture::ShutterDown)
        .then(hold_ms, Gesture::Done)
        .then(TAP_MS, Gesture::ShutterUp))
}

/// Play `script` against `session` until it finishes or Ctrl+C.
pub async fn run_script(session: &mut Session, script: Script) -> Result<RunSummary, Box<dyn Error>> {
    let shutdown = event_loop::shutdown_flag()?;
    let (tx, rx) = mpsc::channel(32);
    let player = script.spawn(tx);
    let summary = event_loop::run(session, rx, shutdown).await;
    player.abort();
    Ok(summary)
}

/// Print each recorder preference and whether it can be produced here.
pub fn list_formats() {
    let backend = FfmpegRecorderBackend::probe();
    if !backend.is_supported() {
        println!("FFmpeg not found; recording is unavailable.");
        println!();
        println!("Install FFmpeg and make sure it is on your PATH.");
        return;
    }
    println!("Recorder formats (best first):");
    for mime in MIME_PREFERENCES {
        let mark = if backend.is_type_supported(mime) { "yes" } else { "no " };
        let container = mime_codecs(mime).map(|c| c.container).unwrap_or("?");
        println!("  [{}] {} ({})", mark, mime, container);
    }
}

/// Print the phrases "add text" picks from.
pub fn print_phrases(config: &Config) {
    if config.text.phrases.is_empty() {
        for phrase in PRESET_PHRASES {
            println!("{}", phrase);
        }
    } else {
        for phrase in &config.text.phrases {
            println!("{}", phrase);
        }
    }
}
