//! End-to-end capture flows against in-memory devices.

mod common;

use common::{run_until, Rig, SMALL_VIEWPORT};
use facelab::blob::CaptureKind;
use facelab::capture::LONG_PRESS_MS;
use facelab::effects::{EffectId, OverlayOptions, TextStyleId};
use facelab::profile::Capabilities;
use facelab::render_loop::FrameKind;
use facelab::session::{Phase, Session, SessionOptions, PRESET_PHRASES};
use facelab::source::{decode_still, FrameSource};
use facelab::stage::{Stage, StillFormat, Viewport};
use facelab::status::{FlowStep, StatusLevel};

/// Press and hold the shutter until the recording starts. Returns the start time.
fn hold_to_record(session: &mut Session, at: u64) -> u64 {
    assert!(session.shutter_down(1, at));
    let start = at + LONG_PRESS_MS;
    session.tick(start);
    assert_eq!(session.phase(), Phase::Recording);
    start
}

#[test]
fn test_bootstrap_reports_ready_devices() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();

    assert!(session.sources().camera_live());
    assert!(session.microphone_live());
    assert_eq!(session.phase(), Phase::Capture);
    assert!(rig.lines().iter().any(|l| l == "Camera and microphone ready"));
    assert_eq!(rig.status.snapshot().steps, vec![FlowStep::Capture]);
}

#[test]
fn test_tap_takes_one_still_and_no_recording() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    run_until(&mut session, 0, 500, 34);

    assert!(session.shutter_down(1, 600));
    session.tick(700);
    session.shutter_up(1, 600 + LONG_PRESS_MS - 1);

    let pending = session.pending().expect("a still is pending");
    assert_eq!(pending.kind, CaptureKind::Image);
    assert!(!pending.dirty);
    assert_eq!(session.phase(), Phase::Edit);

    run_until(&mut session, 934, 2_000, 34);
    assert_eq!(rig.recorder_log().started, 0);
    assert!(rig.lines().iter().any(|l| l == "Photo taken, tap done to save"));
}

#[test]
fn test_hold_records_and_release_keeps_recording() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();

    let start = hold_to_record(&mut session, 100);
    session.shutter_up(1, start + 200);
    run_until(&mut session, start + 34, start + 1_000, 34);

    assert!(session.is_recording());
    assert!(session.pending().is_none());
    assert_eq!(rig.recorder_log().started, 1);
    assert_eq!(rig.recorder_log().bitrates, vec![2_500_000]);
    // microphone audio is merged into the stage stream
    assert_eq!(rig.recorder_log().audio_tracks, vec![1]);
}

#[test]
fn test_recording_stops_once_at_max_duration() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();

    let start = hold_to_record(&mut session, 100);
    let max = session.timings().record_max_ms;
    run_until(&mut session, start + 34, start + max - 10, 34);
    assert!(session.is_recording());

    session.tick(start + max);
    assert!(!session.is_recording());
    assert_eq!(rig.recorder_log().finished, 1);

    let pending = session.pending().expect("the clip is pending");
    assert_eq!(pending.kind, CaptureKind::Video);
    assert!(pending.blob.mime.starts_with("video/webm"));
    assert!(!pending.blob.is_empty());

    run_until(&mut session, start + max + 34, start + max + 1_000, 34);
    assert_eq!(rig.recorder_log().finished, 1);
    assert_eq!(rig.recorder_log().started, 1);

    let progress = rig.status.snapshot().progress;
    assert!(progress.iter().any(|p| *p >= 1.0));
    assert_eq!(progress.last(), Some(&0.0));
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_stop_twice_emits_one_clip() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();

    assert!(session.start_recording(false, 100));
    run_until(&mut session, 100, 1_000, 34);
    session.stop_recording(false, 1_000);
    let first = session.pending().cloned();
    session.stop_recording(false, 1_001);

    assert_eq!(rig.recorder_log().finished, 1);
    assert_eq!(session.pending().cloned(), first);
    let edits = rig
        .status
        .snapshot()
        .steps
        .iter()
        .filter(|s| **s == FlowStep::Edit)
        .count();
    assert_eq!(edits, 1);
}

#[test]
fn test_shutter_ignored_while_recording() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    let start = hold_to_record(&mut session, 0);
    assert!(!session.shutter_down(5, start + 100));
    assert!(!session.start_recording(true, start + 100));
    assert_eq!(rig.recorder_log().started, 1);
}

#[test]
fn test_recording_unsupported_reports_error() {
    let mut rig = Rig::default();
    rig.recorder.unsupported = true;
    let mut session = rig.session();
    session.bootstrap();

    assert!(!session.start_recording(true, 0));
    assert_eq!(session.phase(), Phase::Capture);
    assert!(rig
        .status
        .snapshot()
        .errors()
        .any(|l| l == "Recording is not supported here"));
}

#[test]
fn test_recorder_start_failure_reports_error() {
    let mut rig = Rig::default();
    rig.recorder.start_fails = true;
    let mut session = rig.session();
    session.bootstrap();

    assert!(!session.start_recording(true, 0));
    assert!(!session.is_recording());
    assert!(rig.lines().iter().any(|l| l == "Cannot start recording"));
}

#[test]
fn test_import_still_stops_camera_first() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    let camera = rig.provider_log().cameras[0].clone();
    assert!(camera.is_active());

    let still = Stage::new(40, 30)
        .unwrap()
        .to_blob(StillFormat::Png, 1.0)
        .unwrap();
    assert!(session.import(&still, CaptureKind::Image));

    assert!(!camera.is_active());
    assert!(!session.sources().camera_live());
    assert!(matches!(
        session.sources().resolve(),
        Some(FrameSource::StillImage(_))
    ));
    assert_eq!(session.tick(0), FrameKind::Full);
}

#[test]
fn test_import_garbage_reports_error() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    let junk = facelab::blob::MediaBlob::new("image/png", vec![1, 2, 3]);
    assert!(!session.import(&junk, CaptureKind::Image));
    assert!(session.sources().camera_live());
    assert!(rig.lines().iter().any(|l| l == "Could not open that file"));
}

#[test]
fn test_still_round_trip_matches_stage_size() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    run_until(&mut session, 0, 200, 34);

    assert!(session.snap_photo(250));
    let blob = &session.pending().unwrap().blob;
    assert_eq!(blob.mime, "image/png");
    let frame = decode_still(&blob.bytes).unwrap();
    assert_eq!(
        (frame.width, frame.height),
        (session.stage().width(), session.stage().height())
    );
}

#[test]
fn test_done_saves_then_resets() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    run_until(&mut session, 0, 200, 34);
    session.snap_photo(250);

    session.done(300);
    assert_eq!(session.phase(), Phase::Saved);
    assert!(!session.is_saving());
    let saved = rig.saved();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].0.starts_with("facelab-"));
    assert!(saved[0].0.ends_with(".png"));
    assert!(rig.lines().iter().any(|l| l == "Save sheet shown"));

    // light frames while the save window is open
    assert_eq!(session.tick(340), FrameKind::Light);

    session.tick(300 + session.timings().saved_ack_ms);
    assert_eq!(session.phase(), Phase::Capture);
    assert!(session.pending().is_none());
    assert!(session.sources().camera_live());
    assert_eq!(rig.provider_log().cameras.len(), 2);
    assert!(rig.lines().iter().any(|l| l == "New round"));
    assert_eq!(
        rig.status.snapshot().steps,
        vec![FlowStep::Capture, FlowStep::Edit, FlowStep::Saved, FlowStep::Capture]
    );
}

#[test]
fn test_done_with_nothing_pending_snaps_and_saves() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    run_until(&mut session, 0, 200, 34);

    session.done(250);
    let saved = rig.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].1.mime, "image/png");
    assert_eq!(session.phase(), Phase::Saved);
}

#[test]
fn test_done_while_recording_stops_and_saves() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    let start = hold_to_record(&mut session, 100);
    run_until(&mut session, start + 34, start + 1_500, 34);

    session.done(start + 1_500);
    assert!(!session.is_recording());
    assert_eq!(rig.recorder_log().finished, 1);
    let saved = rig.saved();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].0.ends_with(".webm"));
    assert_eq!(session.phase(), Phase::Saved);
    assert!(rig.lines().iter().any(|l| l == "Stopping and saving"));
}

#[test]
fn test_failed_save_keeps_capture_pending() {
    let mut rig = Rig::default();
    rig.sink.fails = true;
    let mut session = rig.session();
    session.bootstrap();
    run_until(&mut session, 0, 200, 34);
    session.snap_photo(250);

    session.done(300);
    assert_eq!(session.phase(), Phase::Edit);
    assert!(session.pending().is_some());
    assert!(rig
        .status
        .snapshot()
        .lines
        .iter()
        .any(|(level, l)| *level == StatusLevel::Error && l == "Long-press the preview to save"));
}

#[test]
fn test_edited_clip_is_recomposed() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    let start = hold_to_record(&mut session, 100);
    run_until(&mut session, start + 34, start + 1_000, 34);
    session.stop_recording(false, start + 1_000);
    assert_eq!(session.phase(), Phase::Edit);

    session.select_effect(EffectId::Confetti);
    assert!(session.pending().unwrap().dirty);

    let t = start + 1_100;
    session.done(t);
    assert_eq!(session.phase(), Phase::Composing);
    assert_eq!(rig.recorder_log().bitrates, vec![2_500_000, 2_200_000]);
    assert!(!session.shutter_down(1, t + 10));

    // the clip is 20 frames at 10 fps
    run_until(&mut session, t + 34, t + 1_990, 34);
    assert_eq!(session.phase(), Phase::Composing);
    assert!(rig.saved().is_empty());

    session.tick(t + 2_000);
    assert_eq!(session.phase(), Phase::Saved);
    let saved = rig.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].1, session.pending().unwrap().blob);
    assert_eq!(rig.recorder_log().finished, 2);
    assert!(rig.lines().iter().any(|l| l == "Composing effects video"));
}

#[test]
fn test_recompose_falls_back_to_original_clip() {
    let mut rig = Rig::default();
    rig.recorder.start_limit = Some(1);
    let mut session = rig.session();
    session.bootstrap();
    let start = hold_to_record(&mut session, 100);
    run_until(&mut session, start + 34, start + 800, 34);
    session.stop_recording(false, start + 800);
    let original = session.pending().unwrap().blob.clone();

    session.select_text_style(TextStyleId::Neon);
    session.done(start + 900);

    let saved = rig.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].1, original);
    assert_eq!(session.phase(), Phase::Saved);
}

#[test]
fn test_recompose_unknown_duration_uses_fallback_length() {
    let mut rig = Rig::default();
    rig.decoder.clip_frames = 0;
    let mut session = rig.session();
    session.bootstrap();
    let start = hold_to_record(&mut session, 100);
    run_until(&mut session, start + 34, start + 600, 34);
    session.stop_recording(false, start + 600);
    session.select_effect(EffectId::Heart);

    let t = start + 700;
    session.done(t);
    run_until(&mut session, t + 34, t + 3_990, 34);
    assert_eq!(session.phase(), Phase::Composing);
    session.tick(t + 4_000);
    assert_eq!(session.phase(), Phase::Saved);
}

#[test]
fn test_edited_still_is_reencoded() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    run_until(&mut session, 0, 200, 34);
    session.snap_photo(250);
    let original = session.pending().unwrap().blob.clone();

    session.add_preset_text().unwrap();
    assert!(session.pending().unwrap().dirty);
    run_until(&mut session, 284, 600, 34);

    session.done(700);
    let saved = rig.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].1.mime, "image/png");
    assert_ne!(saved[0].1, original);
}

#[test]
fn test_teardown_releases_everything_once() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    let start = hold_to_record(&mut session, 100);
    run_until(&mut session, start + 34, start + 500, 34);
    let camera = rig.provider_log().cameras[0].clone();
    let mic = rig.provider_log().microphones[0].clone();

    session.teardown();
    session.teardown();

    assert_eq!(session.phase(), Phase::TornDown);
    assert!(!camera.is_active());
    assert!(!mic.is_active());
    assert_eq!(rig.recorder_log().finished, 1);
    assert!(session.pending().is_none());
    assert!(rig.saved().is_empty());
    assert_eq!(session.tick(start + 600), FrameKind::Skipped);
    assert!(!session.shutter_down(1, start + 700));
}

#[test]
fn test_camera_failure_still_renders_placeholder() {
    let mut rig = Rig::default();
    rig.provider.camera_fails = true;
    let mut session = rig.session();
    session.bootstrap();

    assert!(rig
        .status
        .snapshot()
        .errors()
        .any(|l| l == "Camera failed to start"));
    assert_eq!(session.tick(0), FrameKind::Full);
    assert!(session.snap_photo(10));
}

#[test]
fn test_insecure_context_skips_device_requests() {
    let rig = Rig::default();
    let options = SessionOptions {
        capabilities: Capabilities {
            secure_context: false,
            ..Capabilities::default()
        },
        ..Rig::options()
    };
    let mut session = rig.session_with(options);
    session.bootstrap();

    assert_eq!(rig.provider_log().requests, 0);
    assert!(rig.lines().iter().any(|l| l == "Camera needs a secure context"));
}

#[test]
fn test_microphone_failure_is_not_fatal() {
    let mut rig = Rig::default();
    rig.provider.mic_fails = true;
    let mut session = rig.session();
    session.bootstrap();

    assert!(session.sources().camera_live());
    assert!(!session.microphone_live());
    assert!(rig.lines().iter().any(|l| l == "Camera ready, microphone pending"));

    let start = hold_to_record(&mut session, 100);
    assert!(session.is_recording());
    assert_eq!(rig.recorder_log().audio_tracks, vec![0]);
    session.stop_recording(false, start + 500);
}

#[test]
fn test_three_preset_texts_are_sticky_and_unique() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();

    let ids: Vec<u64> = (0..3).map(|_| session.add_preset_text().unwrap()).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids[0] != ids[1] && ids[1] != ids[2] && ids[0] != ids[2]);

    run_until(&mut session, 0, 300 * 34, 34);
    let overlays = session.effects().overlays();
    assert_eq!(overlays.len(), 3);
    for overlay in overlays.iter() {
        assert!(overlay.is_sticky());
        assert!(PRESET_PHRASES.contains(&overlay.text.as_str()));
    }
    assert!(rig.lines().iter().any(|l| l == "Text added, drag to move"));
}

#[test]
fn test_drag_moves_overlay_and_marks_edit_dirty() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    run_until(&mut session, 0, 200, 34);
    session.snap_photo(250);

    let id = session
        .add_text(
            "Drag me",
            OverlayOptions {
                sticky: Some(true),
                x: Some(160.0),
                y: Some(300.0),
                font_size: Some(32.0),
                ..OverlayOptions::default()
            },
        )
        .unwrap();
    session.tick(300);

    assert!(!session.stage_pointer_down(2, 5.0, 5.0));
    assert!(session.stage_pointer_down(2, 160.0, 290.0));
    assert!(session.stage_pointer_move(2, 100.0, 200.0));
    assert!(!session.stage_pointer_move(3, 10.0, 10.0));
    assert!(session.stage_pointer_up(2));
    assert!(!session.stage_pointer_up(2));

    let overlay = session.effects().overlays().get(id).unwrap();
    assert_eq!((overlay.x, overlay.y), (100.0, 210.0));
    assert!(session.pending().unwrap().dirty);
    let lines = rig.lines();
    assert!(lines.iter().any(|l| l == "Dragging text"));
    assert!(lines.iter().any(|l| l == "Text placed"));
}

#[test]
fn test_resize_is_debounced_with_light_frames() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    assert_eq!(session.stage().width(), 320);

    let wide = Viewport {
        container_width: 900,
        window_height: 1_400,
        landscape: false,
    };
    session.resize(wide, 1_000);
    assert_eq!(session.tick(1_040), FrameKind::Light);
    assert_eq!(session.stage().width(), 320);

    session.tick(1_080);
    assert_eq!(session.stage().width(), 756);
    assert_eq!(session.stage().height(), 1_008);
    assert_eq!(session.tick(1_300), FrameKind::Full);

    session.orientation_change(SMALL_VIEWPORT, 2_000);
    assert_eq!(session.tick(2_000), FrameKind::Light);
    session.tick(2_080);
    assert_eq!(session.stage().width(), 320);
}

#[test]
fn test_options_without_pending_do_not_mark_dirty() {
    let rig = Rig::default();
    let mut session = rig.session();
    session.bootstrap();
    session.select_effect(EffectId::Glitch);
    session.select_text_style(TextStyleId::Candy);
    assert!(session.pending().is_none());
    assert_eq!(session.effects().effect(), EffectId::Glitch);
    assert_eq!(session.effects().text_style(), TextStyleId::Candy);
    let lines = rig.lines();
    assert!(lines.iter().any(|l| l == "Effect: glitch"));
    assert!(lines.iter().any(|l| l == "Text: candy"));
}
