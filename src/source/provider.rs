//! Camera/microphone provider interface and the constraint fallback ladder.

use super::errors::SourceError;
use super::types::{Facing, FacingRequest, MediaConstraints, MediaStream, VideoConstraints};

/// Something that can hand out live media streams.
pub trait MediaProvider {
    /// Whether the platform can capture at all.
    fn is_supported(&self) -> bool;

    /// Try to acquire a stream matching `constraints`.
    fn acquire(&mut self, constraints: &MediaConstraints) -> Result<MediaStream, SourceError>;
}

/// Camera requests from strictest to loosest.
///
/// 1. Preferred facing plus a preferred portrait resolution
/// 2. Exact facing, any resolution
/// 3. Any video device
pub fn camera_ladder(facing: Facing, tablet: bool) -> Vec<MediaConstraints> {
    let (ideal_width, ideal_height) = if tablet { (960, 1280) } else { (1280, 1920) };
    vec![
        MediaConstraints {
            video: Some(VideoConstraints {
                facing: Some(FacingRequest::Ideal(facing)),
                ideal_width: Some(ideal_width),
                ideal_height: Some(ideal_height),
            }),
            audio: None,
        },
        MediaConstraints {
            video: Some(VideoConstraints {
                facing: Some(FacingRequest::Exact(facing)),
                ideal_width: None,
                ideal_height: None,
            }),
            audio: None,
        },
        MediaConstraints::any_video(),
    ]
}

/// Walk the ladder until one request succeeds.
///
/// Every failure is logged; the error returned names how many attempts were made.
pub fn acquire_with_fallback(
    provider: &mut dyn MediaProvider,
    ladder: &[MediaConstraints],
) -> Result<MediaStream, SourceError> {
    if !provider.is_supported() {
        return Err(SourceError::Unsupported("camera"));
    }

    let mut last_error = None;
    for constraints in ladder {
        match provider.acquire(constraints) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                log::warn!("Camera request failed ({:?}): {}", constraints.video, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(SourceError::PermissionDenied(who)) => Err(SourceError::PermissionDenied(who)),
        _ => Err(SourceError::Exhausted {
            kind: "video",
            attempts: ladder.len(),
        }),
    }
}
