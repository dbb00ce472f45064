//! Tap-or-hold shutter gesture.
//!
//! Pointer-down arms a press timer. Releasing before it fires is a tap; the
//! timer firing first promotes the press to a long press, which starts a
//! locked recording that release does not stop.

use crate::timer::Timer;

/// Default long-press threshold.
pub const LONG_PRESS_MS: u64 = 320;

/// Outcome of a shutter event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterAction {
    /// Nothing to do
    None,
    /// Released before the threshold: take a still
    Photo,
    /// Held past the threshold: start a locked recording
    StartRecording,
    /// Cancelled while a recording started by this press may be running
    Cancelled { long_press: bool },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Press {
    pointer_id: u32,
    long_triggered: bool,
}

/// State of the shutter button.
#[derive(Debug, Clone)]
pub struct ShutterGesture {
    threshold_ms: u64,
    timer: Timer,
    press: Option<Press>,
}

impl Default for ShutterGesture {
    fn default() -> Self {
        Self::new(LONG_PRESS_MS)
    }
}

impl ShutterGesture {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            timer: Timer::new(),
            press: None,
        }
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// A pointer currently holds the shutter.
    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    /// Start a press. Ignored while another press is active.
    pub fn down(&mut self, pointer_id: u32, now: u64) -> bool {
        if self.press.is_some() {
            return false;
        }
        self.press = Some(Press {
            pointer_id,
            long_triggered: false,
        });
        self.timer.arm(now, self.threshold_ms);
        true
    }

    /// Advance the press timer.
    pub fn poll(&mut self, now: u64) -> ShutterAction {
        if !self.timer.fire(now) {
            return ShutterAction::None;
        }
        match self.press.as_mut() {
            Some(press) => {
                press.long_triggered = true;
                ShutterAction::StartRecording
            }
            None => ShutterAction::None,
        }
    }

    /// Release. A tap only counts for the pointer that pressed.
    pub fn up(&mut self, pointer_id: u32, now: u64) -> ShutterAction {
        // a release in the same tick as the deadline still loses to the timer
        let started = self.poll(now) == ShutterAction::StartRecording;
        let action = match self.press {
            Some(press) if press.pointer_id == pointer_id => {
                self.timer.cancel();
                self.press = None;
                if press.long_triggered {
                    ShutterAction::None
                } else {
                    ShutterAction::Photo
                }
            }
            _ => ShutterAction::None,
        };
        if started {
            ShutterAction::StartRecording
        } else {
            action
        }
    }

    /// Pointer cancelled (capture lost, gesture interrupted).
    pub fn cancel(&mut self, pointer_id: u32) -> ShutterAction {
        match self.press {
            Some(press) if press.pointer_id == pointer_id => {
                self.timer.cancel();
                self.press = None;
                ShutterAction::Cancelled {
                    long_press: press.long_triggered,
                }
            }
            _ => ShutterAction::None,
        }
    }

    /// Drop any press without producing an action.
    pub fn reset(&mut self) {
        self.timer.cancel();
        self.press = None;
    }
}
