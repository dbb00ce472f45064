//! "Done": re-composition of edited captures, saving and the reset that
//! follows a successful save.

use super::Session;
use crate::blob::{suggested_filename, unix_millis, CaptureKind, MediaBlob};
use crate::capture::{CaptureStream, Recording};
use crate::save::SaveOutcome;
use crate::status::FlowStep;
use crate::timer::Timer;

/// A pending clip being replayed through the effects and re-recorded.
#[derive(Debug)]
pub struct ComposeJob {
    recording: Recording,
    deadline: Timer,
    /// Saved instead when the re-recording fails
    fallback: MediaBlob,
}

impl ComposeJob {
    pub fn deadline(&self) -> Option<u64> {
        self.deadline.deadline()
    }
}

/// Re-composition length in milliseconds for a clip of `duration_secs`.
pub fn compose_duration_ms(duration_secs: f64, fallback_secs: f64, min_ms: u64, max_ms: u64) -> u64 {
    let secs = if duration_secs > 0.0 {
        duration_secs.min(max_ms as f64 / 1000.0)
    } else {
        fallback_secs
    };
    ((secs * 1000.0).floor() as u64).clamp(min_ms, max_ms)
}

impl Session {
    /// The "done" button: finish whatever is in progress and save it.
    pub fn done(&mut self, now: u64) {
        if self.torn_down || self.compose.is_some() || self.reset_timer.is_armed() {
            return;
        }
        if self.recording.is_some() {
            self.report("Stopping and saving");
            self.stop_recording(true, now);
            return;
        }

        let Some(pending) = self.pending.clone() else {
            // nothing captured yet: save what the stage shows
            if self.snap_photo(now) {
                if let Some(blob) = self.pending.as_ref().map(|p| p.blob.clone()) {
                    let saved = self.save_blob(&blob, CaptureKind::Image, now);
                    self.finalize(saved, now);
                }
            }
            return;
        };

        match (pending.kind, pending.dirty) {
            (CaptureKind::Video, true) => self.begin_compose(pending.blob, now),
            (CaptureKind::Image, true) => {
                let composed = self
                    .stage
                    .to_blob(self.profile.image_format, self.profile.image_quality);
                let blob = match composed {
                    Ok(blob) => {
                        self.set_pending(blob.clone(), CaptureKind::Image);
                        blob
                    }
                    Err(e) => {
                        log::warn!("Edited still could not be encoded: {}", e);
                        pending.blob
                    }
                };
                let saved = self.save_blob(&blob, CaptureKind::Image, now);
                self.finalize(saved, now);
            }
            (kind, false) => {
                let saved = self.save_blob(&pending.blob, kind, now);
                self.finalize(saved, now);
            }
        }
    }

    /// Replay the pending clip from the start and record the stage for its
    /// length. Falls back to the original clip when recording is unavailable.
    fn begin_compose(&mut self, original: MediaBlob, now: u64) {
        let duration_ms = compose_duration_ms(
            self.sources.clip_duration_secs(),
            self.timings.compose_fallback_secs,
            self.timings.compose_min_ms,
            self.timings.compose_max_ms,
        );
        self.report("Composing effects video");

        if !self.capabilities.can_record() || !self.recorder.is_supported() || !self.sources.has_clip() {
            self.save_original(original, now);
            return;
        }
        if let Err(e) = self.sources.restart_clip() {
            log::warn!("Clip restart failed: {}", e);
        }

        let stream = CaptureStream::new(&self.stage, self.profile.export_capture_fps);
        match Recording::start(
            self.recorder.as_mut(),
            stream,
            self.profile.compose_bitrate,
            now,
        ) {
            Ok(recording) => {
                log::info!("Composing {} ms of video", duration_ms);
                let mut deadline = Timer::new();
                deadline.arm(now, duration_ms);
                self.compose = Some(ComposeJob {
                    recording,
                    deadline,
                    fallback: original,
                });
            }
            Err(e) => {
                log::warn!("Compose recorder failed to start: {}", e);
                self.save_original(original, now);
            }
        }
    }

    /// Record the current frame into the compose job and finish it at the
    /// deadline.
    pub(super) fn advance_compose(&mut self, now: u64) {
        let Some(job) = self.compose.as_mut() else {
            return;
        };
        let write_failed = match job.recording.capture(&self.stage, now) {
            Ok(()) => false,
            Err(e) => {
                log::warn!("Compose write failed: {}", e);
                true
            }
        };
        if write_failed || job.deadline.fire(now) {
            self.finish_compose(now);
        }
    }

    fn finish_compose(&mut self, now: u64) {
        let Some(mut job) = self.compose.take() else {
            return;
        };
        match job.recording.stop() {
            Some(Ok(blob)) => {
                self.set_pending(blob.clone(), CaptureKind::Video);
                let saved = self.save_blob(&blob, CaptureKind::Video, now);
                self.finalize(saved, now);
            }
            Some(Err(e)) => {
                log::warn!("Compose produced nothing usable: {}", e);
                self.save_original(job.fallback, now);
            }
            None => self.save_original(job.fallback, now),
        }
    }

    fn save_original(&mut self, original: MediaBlob, now: u64) {
        let saved = self.save_blob(&original, CaptureKind::Video, now);
        self.finalize(saved, now);
    }

    /// Cancel a compose job without saving.
    pub(super) fn discard_compose(&mut self) {
        if let Some(mut job) = self.compose.take() {
            let _ = job.recording.stop();
        }
    }

    /// Hand a blob to the save sink. Light frames run while it is busy.
    pub fn save_blob(&mut self, blob: &MediaBlob, kind: CaptureKind, now: u64) -> bool {
        self.saving = true;
        self.render.freeze(now, self.timings.save_freeze_ms);
        let filename = suggested_filename(blob, kind, unix_millis());
        let outcome = self.sink.save(blob, &filename);
        match &outcome {
            SaveOutcome::Shared => self.report("Save sheet shown"),
            SaveOutcome::Downloaded(path) => {
                log::info!("Saved {}", path.display());
                self.report("Downloaded");
            }
            SaveOutcome::Failed => self.report_error("Long-press the preview to save"),
        }
        self.saving = false;
        outcome.is_saved()
    }

    /// After a successful save show the saved step, then start over.
    pub fn finalize(&mut self, saved: bool, now: u64) -> bool {
        if !saved {
            return false;
        }
        self.set_flow(FlowStep::Saved);
        self.reset_timer.arm(now, self.timings.saved_ack_ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_duration_uses_clip_length() {
        assert_eq!(compose_duration_ms(3.5, 4.0, 1_200, 10_000), 3_500);
        assert_eq!(compose_duration_ms(42.0, 4.0, 1_200, 10_000), 10_000);
    }

    #[test]
    fn test_compose_duration_fallback_and_floor() {
        assert_eq!(compose_duration_ms(0.0, 4.0, 1_200, 10_000), 4_000);
        assert_eq!(compose_duration_ms(0.4, 4.0, 1_200, 10_000), 1_200);
        assert_eq!(compose_duration_ms(1.2349, 4.0, 1_200, 10_000), 1_234);
    }
}
