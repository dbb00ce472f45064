//! The user-visible status channel and the capture flow indicator.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Ok,
    Error,
}

/// Steps of one creation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlowStep {
    Capture,
    Recording,
    Edit,
    Saved,
}

impl FlowStep {
    pub const ALL: [FlowStep; 4] = [
        FlowStep::Capture,
        FlowStep::Recording,
        FlowStep::Edit,
        FlowStep::Saved,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// How `other` should be shown while `self` is the active step.
    pub fn mark_of(self, other: FlowStep) -> StepMark {
        match other.index().cmp(&self.index()) {
            std::cmp::Ordering::Less => StepMark::Done,
            std::cmp::Ordering::Equal => StepMark::Active,
            std::cmp::Ordering::Greater => StepMark::Pending,
        }
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStep::Capture => "capture",
            FlowStep::Recording => "recording",
            FlowStep::Edit => "edit",
            FlowStep::Saved => "saved",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Done,
    Active,
    Pending,
}

/// Where status text, flow changes and shutter progress are reported.
pub trait StatusSink {
    fn status(&mut self, text: &str, level: StatusLevel);

    fn flow(&mut self, _step: FlowStep) {}

    /// Recording progress in `0.0..=1.0`.
    fn progress(&mut self, _value: f32) {}
}

/// Routes status lines to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&mut self, text: &str, level: StatusLevel) {
        match level {
            StatusLevel::Ok => log::info!("{}", text),
            StatusLevel::Error => log::warn!("{}", text),
        }
    }

    fn flow(&mut self, step: FlowStep) {
        let marks: Vec<String> = FlowStep::ALL
            .iter()
            .map(|s| match step.mark_of(*s) {
                StepMark::Done => format!("[x] {}", s),
                StepMark::Active => format!("[>] {}", s),
                StepMark::Pending => format!("[ ] {}", s),
            })
            .collect();
        log::debug!("flow: {}", marks.join("  "));
    }
}

/// Everything a [`MemoryStatus`] has seen.
#[derive(Debug, Default, Clone)]
pub struct StatusRecord {
    pub lines: Vec<(StatusLevel, String)>,
    pub steps: Vec<FlowStep>,
    pub progress: Vec<f32>,
}

impl StatusRecord {
    pub fn last_line(&self) -> Option<&str> {
        self.lines.last().map(|(_, text)| text.as_str())
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|(level, _)| *level == StatusLevel::Error)
            .map(|(_, text)| text.as_str())
    }
}

/// In-memory status sink. Clones share one record.
#[derive(Debug, Default, Clone)]
pub struct MemoryStatus {
    record: Arc<Mutex<StatusRecord>>,
}

impl MemoryStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusRecord {
        self.record.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl StatusSink for MemoryStatus {
    fn status(&mut self, text: &str, level: StatusLevel) {
        if let Ok(mut record) = self.record.lock() {
            record.lines.push((level, text.to_string()));
        }
    }

    fn flow(&mut self, step: FlowStep) {
        if let Ok(mut record) = self.record.lock() {
            record.steps.push(step);
        }
    }

    fn progress(&mut self, value: f32) {
        if let Ok(mut record) = self.record.lock() {
            record.progress.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_marks() {
        let active = FlowStep::Edit;
        assert_eq!(active.mark_of(FlowStep::Capture), StepMark::Done);
        assert_eq!(active.mark_of(FlowStep::Recording), StepMark::Done);
        assert_eq!(active.mark_of(FlowStep::Edit), StepMark::Active);
        assert_eq!(active.mark_of(FlowStep::Saved), StepMark::Pending);
    }

    #[test]
    fn test_memory_status_clones_share_record() {
        let status = MemoryStatus::new();
        let mut sink = status.clone();
        sink.status("ready", StatusLevel::Ok);
        sink.status("no microphone", StatusLevel::Error);
        sink.flow(FlowStep::Recording);
        let record = status.snapshot();
        assert_eq!(record.lines.len(), 2);
        assert_eq!(record.last_line(), Some("no microphone"));
        assert_eq!(record.errors().count(), 1);
        assert_eq!(record.steps, vec![FlowStep::Recording]);
    }
}
