//! Cancellable one-shot timers and freeze windows on a millisecond clock.
//!
//! Time is whatever monotonic millisecond value the caller passes in, so the
//! same state machines run on a real clock or a simulated one.

/// A one-shot timer. Fires at most once per arm.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<u64>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer to fire `delay_ms` after `now`.
    pub fn arm(&mut self, now: u64, delay_ms: u64) {
        self.deadline = Some(now.saturating_add(delay_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Returns true exactly once when `now` reaches the deadline, then disarms.
    pub fn fire(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// A window during which some work is deferred.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FreezeWindow {
    until: u64,
}

impl FreezeWindow {
    /// Freeze from `now` for `duration_ms`. Replaces any earlier window.
    pub fn freeze(&mut self, now: u64, duration_ms: u64) {
        self.until = now.saturating_add(duration_ms);
    }

    pub fn is_active(&self, now: u64) -> bool {
        now < self.until
    }

    pub fn clear(&mut self) {
        self.until = 0;
    }
}
