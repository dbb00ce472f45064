//! Async driver for a capture session.
//!
//! A fixed-rate interval stands in for the display's frame callback and
//! feeds [`Session::tick`]. Gestures arrive over a channel, usually from a
//! [`Script`] task, and a shared flag (set by Ctrl+C) ends the loop. The
//! session is torn down on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::blob::{CaptureKind, MediaBlob};
use crate::effects::{EffectId, TextStyleId};
use crate::render_loop::FrameKind;
use crate::session::{Phase, Session};
use crate::stage::Viewport;

/// Interval of the frame callback (~60 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Pointer id used for scripted shutter presses.
const SHUTTER_POINTER: u32 = 1;

/// Pointer id used for scripted stage drags.
const STAGE_POINTER: u32 = 2;

/// One user gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    ShutterDown,
    ShutterUp,
    ShutterCancel,
    Done,
    SelectEffect(EffectId),
    SelectStyle(TextStyleId),
    AddPresetText,
    AddText(String),
    StageDown { x: f32, y: f32 },
    StageMove { x: f32, y: f32 },
    StageUp,
    Import(MediaBlob, CaptureKind),
    Resize(Viewport),
    Orientation(Viewport),
    /// End the run
    Quit,
}

/// Gestures with the delay to wait before each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    steps: Vec<(Duration, Gesture)>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gesture sent `delay_ms` after the previous one.
    pub fn then(mut self, delay_ms: u64, gesture: Gesture) -> Self {
        self.steps.push((Duration::from_millis(delay_ms), gesture));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Play the script into `tx`. The sender is dropped at the end, which
    /// lets the loop finish once the session is idle.
    pub fn spawn(self, tx: mpsc::Sender<Gesture>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            for (delay, gesture) in self.steps {
                tokio::time::sleep(delay).await;
                if tx.send(gesture).await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Counters from one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub full_frames: u64,
    pub light_frames: u64,
    pub skipped: u64,
    pub gestures: u64,
    pub interrupted: bool,
}

/// Deliver one gesture at `now`.
pub fn apply_gesture(session: &mut Session, gesture: Gesture, now: u64) {
    match gesture {
        Gesture::ShutterDown => {
            if !session.shutter_down(SHUTTER_POINTER, now) {
                log::debug!("Shutter press ignored in {:?}", session.phase());
            }
        }
        Gesture::ShutterUp => session.shutter_up(SHUTTER_POINTER, now),
        Gesture::ShutterCancel => session.shutter_cancel(SHUTTER_POINTER, now),
        Gesture::Done => session.done(now),
        Gesture::SelectEffect(effect) => session.select_effect(effect),
        Gesture::SelectStyle(style) => session.select_text_style(style),
        Gesture::AddPresetText => {
            session.add_preset_text();
        }
        Gesture::AddText(text) => {
            let options = crate::effects::OverlayOptions {
                sticky: Some(true),
                style: Some(session.effects().text_style()),
                ..Default::default()
            };
            session.add_text(&text, options);
        }
        Gesture::StageDown { x, y } => {
            session.stage_pointer_down(STAGE_POINTER, x, y);
        }
        Gesture::StageMove { x, y } => {
            session.stage_pointer_move(STAGE_POINTER, x, y);
        }
        Gesture::StageUp => {
            session.stage_pointer_up(STAGE_POINTER);
        }
        Gesture::Import(blob, kind) => {
            session.import(&blob, kind);
        }
        Gesture::Resize(viewport) => session.resize(viewport, now),
        Gesture::Orientation(viewport) => session.orientation_change(viewport, now),
        Gesture::Quit => {}
    }
}

/// Drive `session` until a quit gesture, the shutdown flag, or the gesture
/// channel closing while nothing is in progress.
pub async fn run(
    session: &mut Session,
    mut gestures: mpsc::Receiver<Gesture>,
    shutdown: Arc<AtomicBool>,
) -> RunSummary {
    let started = Instant::now();
    let clock = || started.elapsed().as_millis() as u64;

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut summary = RunSummary::default();
    let mut channel_open = true;

    session.bootstrap();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("Shutdown requested");
            summary.interrupted = true;
            break;
        }
        if !channel_open && matches!(session.phase(), Phase::Capture | Phase::Edit) {
            break;
        }

        tokio::select! {
            maybe_gesture = gestures.recv(), if channel_open => {
                match maybe_gesture {
                    Some(Gesture::Quit) => break,
                    Some(gesture) => {
                        summary.gestures += 1;
                        log::debug!("Gesture {:?}", gesture);
                        apply_gesture(session, gesture, clock());
                    }
                    None => channel_open = false,
                }
            }

            _ = interval.tick() => {
                match session.tick(clock()) {
                    FrameKind::Full => summary.full_frames += 1,
                    FrameKind::Light => summary.light_frames += 1,
                    FrameKind::Skipped => summary.skipped += 1,
                }
            }
        }
    }

    session.teardown();
    log::info!(
        "Loop finished: {} full, {} light, {} skipped frames",
        summary.full_frames,
        summary.light_frames,
        summary.skipped
    );
    summary
}

/// Install a Ctrl+C handler that raises the returned flag.
pub fn shutdown_flag() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_builder() {
        let script = Script::new()
            .then(0, Gesture::ShutterDown)
            .then(100, Gesture::ShutterUp);
        assert_eq!(script.len(), 2);
        assert!(!script.is_empty());
        assert!(Script::new().is_empty());
    }

    #[tokio::test]
    async fn test_script_plays_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = Script::new()
            .then(0, Gesture::AddPresetText)
            .then(5, Gesture::Done)
            .spawn(tx);
        assert_eq!(rx.recv().await, Some(Gesture::AddPresetText));
        assert_eq!(rx.recv().await, Some(Gesture::Done));
        assert_eq!(rx.recv().await, None);
        handle.await.unwrap();
    }
}
