//! The session-level source slot and the per-frame source resolver.
//!
//! An explicitly activated still or clip always wins over the live camera.
//! Activating one releases whatever held the slot before it, camera included.

use std::sync::Arc;

use super::clip::ClipPlayback;
use super::errors::SourceError;
use super::types::{Frame, MediaStream};

/// The picture the compositor should draw this frame.
#[derive(Debug, Clone)]
pub enum FrameSource {
    LiveCamera(Arc<Frame>),
    StillImage(Arc<Frame>),
    VideoClip(Arc<Frame>),
}

impl FrameSource {
    pub fn frame(&self) -> &Frame {
        match self {
            FrameSource::LiveCamera(f) | FrameSource::StillImage(f) | FrameSource::VideoClip(f) => f,
        }
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.frame().natural_size()
    }
}

/// A source the user (or a capture) picked explicitly.
enum Explicit {
    Image(Arc<Frame>),
    Clip(Box<dyn ClipPlayback>),
}

/// Owner of the camera stream and the explicit source.
#[derive(Default)]
pub struct SourceSlot {
    camera: Option<MediaStream>,
    explicit: Option<Explicit>,
}

impl std::fmt::Debug for SourceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let explicit = match &self.explicit {
            None => "none",
            Some(Explicit::Image(_)) => "image",
            Some(Explicit::Clip(_)) => "clip",
        };
        f.debug_struct("SourceSlot")
            .field("camera_live", &self.camera_live())
            .field("explicit", &explicit)
            .finish()
    }
}

impl SourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly acquired camera stream.
    ///
    /// The previous camera and any explicit source are released first.
    pub fn set_camera(&mut self, stream: MediaStream) {
        self.stop_camera();
        self.clear_explicit();
        self.camera = Some(stream);
    }

    /// Stop every camera track and empty the camera slot.
    pub fn stop_camera(&mut self) {
        if let Some(stream) = self.camera.take() {
            stream.stop_all();
        }
    }

    /// True while the camera slot holds at least one live track.
    pub fn camera_live(&self) -> bool {
        self.camera.as_ref().is_some_and(MediaStream::is_active)
    }

    pub fn camera(&self) -> Option<&MediaStream> {
        self.camera.as_ref()
    }

    /// Make a decoded still the active source.
    pub fn set_image(&mut self, frame: Frame) {
        self.stop_camera();
        self.clear_explicit();
        self.explicit = Some(Explicit::Image(Arc::new(frame)));
    }

    /// Make a clip the active source.
    pub fn set_clip(&mut self, clip: Box<dyn ClipPlayback>) {
        self.stop_camera();
        self.clear_explicit();
        self.explicit = Some(Explicit::Clip(clip));
    }

    /// Drop the explicit source, releasing a clip's backing media.
    pub fn clear_explicit(&mut self) {
        if let Some(Explicit::Clip(mut clip)) = self.explicit.take() {
            clip.release();
        }
    }

    pub fn has_explicit(&self) -> bool {
        self.explicit.is_some()
    }

    pub fn has_clip(&self) -> bool {
        matches!(self.explicit, Some(Explicit::Clip(_)))
    }

    /// Duration of the active clip, 0.0 when there is none or it is unknown.
    pub fn clip_duration_secs(&self) -> f64 {
        match &self.explicit {
            Some(Explicit::Clip(clip)) => clip.duration_secs(),
            _ => 0.0,
        }
    }

    /// Seek the active clip back to its start. No-op without a clip.
    pub fn restart_clip(&mut self) -> Result<(), SourceError> {
        match &mut self.explicit {
            Some(Explicit::Clip(clip)) => clip.restart(),
            _ => Ok(()),
        }
    }

    /// Pick the source for this frame, or `None` when nothing is ready.
    pub fn resolve(&self) -> Option<FrameSource> {
        match &self.explicit {
            Some(Explicit::Image(frame)) => Some(FrameSource::StillImage(Arc::clone(frame))),
            Some(Explicit::Clip(clip)) => clip.current_frame().map(FrameSource::VideoClip),
            None => self
                .camera
                .as_ref()
                .filter(|s| s.is_active())
                .and_then(MediaStream::latest_frame)
                .map(FrameSource::LiveCamera),
        }
    }

    /// Release everything. Safe to call repeatedly.
    pub fn release_all(&mut self) {
        self.clear_explicit();
        self.stop_camera();
    }
}
