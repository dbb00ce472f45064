//! Frame sources: live camera, imported stills and looping clips.
//!
//! The camera and microphone are reached through [`MediaProvider`]; the
//! FFmpeg-backed implementation lives in [`ffmpeg`]. Imports go through a
//! [`MediaDecoder`]. [`SourceSlot`] owns whichever source is active and
//! resolves it once per frame.

pub mod clip;
pub mod decode;
pub mod errors;
pub mod ffmpeg;
pub mod provider;
pub mod resolver;
pub mod types;

pub use clip::{ClipInfo, ClipPlayback, FfmpegClip, FrameSequence};
pub use decode::{decode_still, FfmpegDecoder, MediaDecoder};
pub use errors::SourceError;
pub use ffmpeg::FfmpegDevices;
pub use provider::{acquire_with_fallback, camera_ladder, MediaProvider};
pub use resolver::{FrameSource, SourceSlot};
pub use types::{
    new_feed, DeviceInput, Facing, Frame, FrameFeed, FrameFormat, MediaConstraints, MediaStream,
    MediaTrack, TrackKind, TrackState,
};
