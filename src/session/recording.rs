//! Shutter handling and the live recording lifecycle.

use super::Session;
use crate::blob::CaptureKind;
use crate::capture::{CaptureError, CaptureStream, Recording, ShutterAction};
use crate::status::FlowStep;

/// The clip currently being recorded from the stage.
#[derive(Debug)]
pub struct ActiveRecording {
    recording: Recording,
    /// Started by a long press; releasing the shutter does not stop it
    locked: bool,
}

impl ActiveRecording {
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }
}

impl Session {
    /// Shutter pressed. Returns false when the press is ignored.
    pub fn shutter_down(&mut self, pointer_id: u32, now: u64) -> bool {
        if self.torn_down || self.recording.is_some() || self.saving || self.compose.is_some() {
            return false;
        }
        self.shutter.down(pointer_id, now)
    }

    /// Shutter released: a tap takes a still.
    pub fn shutter_up(&mut self, pointer_id: u32, now: u64) {
        let action = self.shutter.up(pointer_id, now);
        self.apply_shutter(action, now);
    }

    /// Shutter gesture cancelled by the platform.
    pub fn shutter_cancel(&mut self, pointer_id: u32, now: u64) {
        if let ShutterAction::Cancelled { .. } = self.shutter.cancel(pointer_id) {
            if self.recording.as_ref().is_some_and(|r| !r.locked) {
                self.stop_recording(false, now);
            }
        }
    }

    pub(super) fn poll_shutter(&mut self, now: u64) {
        let action = self.shutter.poll(now);
        self.apply_shutter(action, now);
    }

    fn apply_shutter(&mut self, action: ShutterAction, now: u64) {
        match action {
            ShutterAction::Photo => {
                self.snap_photo(now);
            }
            ShutterAction::StartRecording => {
                self.start_recording(true, now);
            }
            ShutterAction::None | ShutterAction::Cancelled { .. } => {}
        }
    }

    /// Encode the current stage as a still and hold it for review.
    pub fn snap_photo(&mut self, _now: u64) -> bool {
        match self
            .stage
            .to_blob(self.profile.image_format, self.profile.image_quality)
        {
            Ok(blob) => {
                self.set_pending(blob, CaptureKind::Image);
                self.report("Photo taken, tap done to save");
                true
            }
            Err(e) => {
                log::warn!("Photo encode failed: {}", e);
                self.report_error("Photo failed");
                false
            }
        }
    }

    /// Record the stage, merging microphone audio when available.
    pub fn start_recording(&mut self, locked: bool, now: u64) -> bool {
        if self.torn_down || self.recording.is_some() {
            return false;
        }
        if !self.capabilities.can_record() || !self.recorder.is_supported() {
            self.report_error("Recording is not supported here");
            return false;
        }

        let mut stream = CaptureStream::new(&self.stage, self.profile.export_capture_fps);
        if self.prepare_microphone(true) {
            if let Some(mic) = &self.microphone {
                for track in mic.audio_tracks() {
                    stream.add_audio_track(track.clone());
                }
            }
        } else {
            self.report_error("Microphone not ready, the clip may be silent");
        }

        match Recording::start(
            self.recorder.as_mut(),
            stream,
            self.profile.export_bitrate,
            now,
        ) {
            Ok(recording) => {
                self.recording = Some(ActiveRecording { recording, locked });
                self.set_flow(FlowStep::Recording);
                self.report("Recording…");
                self.status.progress(0.0);
                true
            }
            Err(e) => {
                log::warn!("Recorder start failed: {}", e);
                self.report_error("Cannot start recording");
                false
            }
        }
    }

    /// Stop the active recording. The clip becomes the pending capture and,
    /// with `save_and_reset`, is saved straight away.
    ///
    /// Calling this with nothing recording does nothing.
    pub fn stop_recording(&mut self, save_and_reset: bool, now: u64) {
        let Some(mut active) = self.recording.take() else {
            return;
        };
        let Some(result) = active.recording.stop() else {
            return;
        };
        self.status.progress(0.0);
        match result {
            Ok(blob) => {
                log::info!(
                    "Recorded {} bytes ({} frames)",
                    blob.len(),
                    active.recording.frames_written()
                );
                self.set_pending(blob.clone(), CaptureKind::Video);
                if save_and_reset {
                    let saved = self.save_blob(&blob, CaptureKind::Video, now);
                    self.finalize(saved, now);
                } else {
                    self.report("Recording done, tap done to save");
                }
            }
            Err(CaptureError::Empty) => {
                self.set_flow(FlowStep::Capture);
                self.report_error("Recording was empty");
            }
            Err(e) => {
                log::warn!("Recorder failed: {}", e);
                self.set_flow(FlowStep::Capture);
                self.report_error("Recording failed");
            }
        }
    }

    /// Drive the countdown ring and stop at the maximum length.
    pub(super) fn advance_recording(&mut self, now: u64) {
        let Some(active) = &self.recording else {
            return;
        };
        let max = self.timings.record_max_ms.max(1);
        let pct = (active.recording.elapsed(now) as f64 / max as f64).min(1.0) as f32;
        self.status.progress(pct);
        if pct >= 1.0 {
            self.stop_recording(false, now);
        }
    }

    /// Feed the freshly drawn stage to the recorder.
    pub(super) fn capture_recording_frame(&mut self, now: u64) {
        let Some(active) = self.recording.as_mut() else {
            return;
        };
        if let Err(e) = active.recording.capture(&self.stage, now) {
            log::warn!("Recorder write failed: {}", e);
            self.stop_recording(false, now);
        }
    }

    /// Stop without keeping the clip.
    pub(super) fn discard_recording(&mut self) {
        if let Some(mut active) = self.recording.take() {
            if let Some(Err(e)) = active.recording.stop() {
                log::debug!("Discarded recording ended with: {}", e);
            }
        }
    }
}
