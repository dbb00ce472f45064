//! FFmpeg-backed camera and microphone provider.
//!
//! The camera runs in a background thread that reads raw RGB frames from an
//! FFmpeg child and keeps only the newest one in a shared [`FrameFeed`]. The
//! video track's live flag is the thread's stop signal.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::errors::SourceError;
use super::provider::MediaProvider;
use super::types::{
    new_feed, DeviceInput, Facing, FacingRequest, Frame, FrameFeed, FrameFormat, MediaConstraints,
    MediaStream, MediaTrack, TrackKind,
};
use crate::pipeline::{
    ffmpeg_available, platform_audio_format, platform_capture_format, Pipeline, PipelineError,
};

/// Output size used when the request names no resolution.
const DEFAULT_CAPTURE_SIZE: (u32, u32) = (1280, 720);

/// How long to wait for the first frame before giving up on a request.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(4);

/// Camera + microphone access through FFmpeg device inputs.
#[derive(Debug, Clone)]
pub struct FfmpegDevices {
    /// Camera input target (`0` on macOS, `/dev/video0` on Linux)
    pub camera: String,
    /// Microphone input target (`:0` on macOS, `default` on Linux)
    pub microphone: String,
    /// Capture framerate requested from the device
    pub framerate: u32,
    /// Flip the selfie camera horizontally
    pub mirror: bool,
}

impl Default for FfmpegDevices {
    fn default() -> Self {
        let (camera, microphone) = if cfg!(target_os = "macos") {
            ("0", ":0")
        } else if cfg!(target_os = "windows") {
            ("video=Integrated Camera", "audio=Microphone")
        } else {
            ("/dev/video0", "default")
        };
        Self {
            camera: camera.to_string(),
            microphone: microphone.to_string(),
            framerate: 30,
            mirror: true,
        }
    }
}

impl FfmpegDevices {
    /// Build the FFmpeg argument list for one camera request.
    ///
    /// Returns the output frame size alongside the arguments.
    pub fn camera_args(&self, constraints: &MediaConstraints) -> Result<(Vec<String>, (u32, u32)), SourceError> {
        let video = constraints.video.clone().unwrap_or_default();

        // Desktop cameras only face the user.
        if video.facing == Some(FacingRequest::Exact(Facing::Environment)) {
            return Err(SourceError::DeviceFailed {
                device: self.camera.clone(),
                message: "no environment-facing camera".to_string(),
            });
        }

        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            platform_capture_format().to_string(),
            "-framerate".to_string(),
            self.framerate.to_string(),
        ];

        let size = match (video.ideal_width, video.ideal_height) {
            (Some(w), Some(h)) => {
                args.push("-video_size".to_string());
                args.push(format!("{}x{}", w, h));
                (w, h)
            }
            _ => DEFAULT_CAPTURE_SIZE,
        };

        args.push("-i".to_string());
        args.push(self.camera.clone());

        let mut filter = format!("scale={}:{}", size.0, size.1);
        let facing_user = !matches!(
            video.facing,
            Some(FacingRequest::Ideal(Facing::Environment))
        );
        if self.mirror && facing_user {
            filter.push_str(",hflip");
        }
        args.extend(
            [
                "-vf",
                filter.as_str(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        Ok((args, size))
    }

    fn open_camera(&self, constraints: &MediaConstraints) -> Result<MediaStream, SourceError> {
        let (args, (width, height)) = self.camera_args(constraints)?;
        let mut pipeline = Pipeline::spawn("ffmpeg", &args, false).map_err(pipeline_to_source)?;
        let stdout = pipeline.take_stdout().ok_or_else(|| SourceError::DeviceFailed {
            device: self.camera.clone(),
            message: "no stdout".to_string(),
        })?;

        let feed = new_feed();
        let track = MediaTrack::new(TrackKind::Video, format!("camera {}", self.camera)).with_device(
            DeviceInput {
                format: platform_capture_format().to_string(),
                target: self.camera.clone(),
            },
        );

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_feed = Arc::clone(&feed);
        let live = track.live_flag();
        thread::spawn(move || {
            run_capture_loop(pipeline, stdout, width, height, thread_feed, live, ready_tx);
        });

        match ready_rx.recv_timeout(FIRST_FRAME_TIMEOUT) {
            Ok(Ok(())) => {
                log::info!("Camera {} streaming at {}x{}", self.camera, width, height);
                Ok(MediaStream::new(vec![track]).with_frames(feed))
            }
            Ok(Err(message)) => {
                track.stop();
                Err(classify_device_error(&self.camera, message))
            }
            Err(_) => {
                track.stop();
                Err(SourceError::DeviceFailed {
                    device: self.camera.clone(),
                    message: "timed out waiting for the first frame".to_string(),
                })
            }
        }
    }
}

impl MediaProvider for FfmpegDevices {
    fn is_supported(&self) -> bool {
        ffmpeg_available()
    }

    fn acquire(&mut self, constraints: &MediaConstraints) -> Result<MediaStream, SourceError> {
        if constraints.video.is_some() {
            return self.open_camera(constraints);
        }
        if constraints.audio.is_some() {
            if !ffmpeg_available() {
                return Err(SourceError::FfmpegNotFound);
            }
            let track = MediaTrack::new(TrackKind::Audio, format!("microphone {}", self.microphone))
                .with_device(DeviceInput {
                    format: platform_audio_format().to_string(),
                    target: self.microphone.clone(),
                });
            return Ok(MediaStream::new(vec![track]));
        }
        Err(SourceError::Unsupported("empty request"))
    }
}

/// Read fixed-size RGB frames until the track is stopped or FFmpeg exits.
pub(crate) fn run_capture_loop(
    mut pipeline: Pipeline,
    mut stdout: std::process::ChildStdout,
    width: u32,
    height: u32,
    feed: FrameFeed,
    live: Arc<AtomicBool>,
    ready_tx: Sender<Result<(), String>>,
) {
    let frame_len = width as usize * height as usize * 3;
    let mut buf = vec![0u8; frame_len];
    let mut announced = false;

    while live.load(Ordering::SeqCst) {
        if stdout.read_exact(&mut buf).is_err() {
            break;
        }
        if let Some(frame) = Frame::new(buf.clone(), width, height, FrameFormat::Rgb) {
            if let Ok(mut slot) = feed.lock() {
                *slot = Some(Arc::new(frame));
            }
        }
        if !announced {
            announced = true;
            let _ = ready_tx.send(Ok(()));
        }
    }

    let _ = pipeline.shutdown();
    if !announced {
        let stderr = pipeline.take_stderr_output().join("\n");
        let _ = ready_tx.send(Err(if stderr.is_empty() {
            "camera stream ended before the first frame".to_string()
        } else {
            stderr
        }));
    }
    live.store(false, Ordering::SeqCst);
}

fn classify_device_error(device: &str, message: String) -> SourceError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("authorization") {
        SourceError::PermissionDenied(device.to_string())
    } else {
        SourceError::DeviceFailed {
            device: device.to_string(),
            message,
        }
    }
}

pub(crate) fn pipeline_to_source(e: PipelineError) -> SourceError {
    match e {
        PipelineError::FfmpegNotFound => SourceError::FfmpegNotFound,
        PipelineError::Io(io) => SourceError::Io(io),
        other => SourceError::Decode(other.to_string()),
    }
}
