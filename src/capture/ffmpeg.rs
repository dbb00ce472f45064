//! FFmpeg recorder backend.
//!
//! Stage frames go to FFmpeg's stdin as raw RGBA. The encoded container is
//! streamed back on stdout (fragmented MP4 or WebM) and collected by a reader
//! thread, so data chunks become available while the recording is running.

use std::io::{Read, Write};
use std::process::ChildStdin;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use super::errors::CaptureError;
use super::recorder::{CaptureStream, RecorderBackend, RecorderHandle, RecorderOptions};
use crate::pipeline::{ffmpeg_available, run_to_completion, Pipeline};

const READ_CHUNK: usize = 64 * 1024;

/// Container and encoder choices for one mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimeCodecs {
    pub container: &'static str,
    /// Acceptable video encoders, best first
    pub video: &'static [&'static str],
    pub audio: &'static [&'static str],
}

/// Map a recorder mime type to FFmpeg container and encoder names.
pub fn mime_codecs(mime: &str) -> Option<MimeCodecs> {
    const H264: &[&str] = &["libx264", "h264_videotoolbox", "libopenh264"];
    let codecs = match mime {
        "video/mp4;codecs=h264,aac" => MimeCodecs {
            container: "mp4",
            video: H264,
            audio: &["aac"],
        },
        "video/webm;codecs=vp9,opus" => MimeCodecs {
            container: "webm",
            video: &["libvpx-vp9"],
            audio: &["libopus"],
        },
        "video/webm;codecs=vp8,opus" => MimeCodecs {
            container: "webm",
            video: &["libvpx"],
            audio: &["libopus"],
        },
        "video/webm" => MimeCodecs {
            container: "webm",
            video: &["libvpx", "libvpx-vp9"],
            audio: &["libopus", "libvorbis"],
        },
        "video/mp4" => MimeCodecs {
            container: "mp4",
            video: &["libx264", "h264_videotoolbox", "libopenh264", "mpeg4"],
            audio: &["aac"],
        },
        _ => return None,
    };
    Some(codecs)
}

/// Encoder names from `ffmpeg -encoders` output.
pub fn parse_encoders(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim_start)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            // flag column looks like "V....D" / "A....." / "S....."
            let is_entry = flags.len() == 6
                && matches!(flags.as_bytes()[0], b'V' | b'A' | b'S')
                && name != "=";
            is_entry.then(|| name.to_string())
        })
        .collect()
}

/// Records through an `ffmpeg` child process.
#[derive(Debug, Clone)]
pub struct FfmpegRecorderBackend {
    encoders: Vec<String>,
    available: bool,
}

impl FfmpegRecorderBackend {
    /// Probe the local FFmpeg for its encoders.
    pub fn probe() -> Self {
        if !ffmpeg_available() {
            log::warn!("FFmpeg not available; video recording disabled");
            return Self::with_encoders(Vec::new(), false);
        }
        let encoders = match run_to_completion("ffmpeg", &["-hide_banner", "-encoders"]) {
            Ok(output) => parse_encoders(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                log::warn!("Could not list FFmpeg encoders: {}", e);
                Vec::new()
            }
        };
        log::debug!("FFmpeg offers {} encoders", encoders.len());
        Self::with_encoders(encoders, true)
    }

    pub fn with_encoders(encoders: Vec<String>, available: bool) -> Self {
        Self { encoders, available }
    }

    fn first_encoder(&self, candidates: &[&'static str]) -> Option<&'static str> {
        candidates
            .iter()
            .copied()
            .find(|c| self.encoders.iter().any(|e| e == c))
    }

    /// Full FFmpeg argument list for one recording.
    pub fn build_args(&self, stream: &CaptureStream, options: &RecorderOptions) -> Result<Vec<String>, CaptureError> {
        let codecs = mime_codecs(&options.mime).ok_or(CaptureError::NoSupportedMime { tried: 1 })?;
        let video = self
            .first_encoder(codecs.video)
            .ok_or_else(|| CaptureError::RecorderStart(format!("no encoder for {}", options.mime)))?;
        let (width, height) = stream.size();

        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "-s".into(),
            format!("{}x{}", width, height),
            "-r".into(),
            stream.fps().to_string(),
            "-i".into(),
            "-".into(),
        ];

        let audio_device = stream.audio_tracks().find_map(|t| t.device().cloned());
        let audio = match (&audio_device, self.first_encoder(codecs.audio)) {
            (Some(device), Some(encoder)) => {
                args.extend(["-f".into(), device.format.clone(), "-i".into(), device.target.clone()]);
                Some(encoder)
            }
            (Some(_), None) => {
                log::warn!("No audio encoder for {}; recording video only", options.mime);
                None
            }
            _ => None,
        };

        args.extend([
            "-vf".into(),
            "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
            "-c:v".into(),
            video.into(),
            "-b:v".into(),
            options.bits_per_second.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]);
        if video == "libx264" {
            args.extend(["-preset", "veryfast"].map(String::from));
        }
        if let Some(encoder) = audio {
            args.extend(["-map", "0:v", "-map", "1:a", "-c:a", encoder, "-shortest"].map(String::from));
        }
        if codecs.container == "mp4" {
            args.extend(["-movflags", "frag_keyframe+empty_moov+default_base_moof"].map(String::from));
        }
        args.extend(["-f", codecs.container, "-"].map(String::from));
        Ok(args)
    }
}

impl RecorderBackend for FfmpegRecorderBackend {
    fn is_supported(&self) -> bool {
        self.available
    }

    fn is_type_supported(&self, mime: &str) -> bool {
        self.available
            && mime_codecs(mime).is_some_and(|codecs| self.first_encoder(codecs.video).is_some())
    }

    fn start(
        &mut self,
        stream: &CaptureStream,
        options: &RecorderOptions,
    ) -> Result<Box<dyn RecorderHandle>, CaptureError> {
        if !self.available {
            return Err(CaptureError::FfmpegNotFound);
        }
        let args = self.build_args(stream, options)?;
        let mut pipeline = Pipeline::spawn("ffmpeg", &args, true)
            .map_err(|e| CaptureError::RecorderStart(e.to_string()))?;
        let stdin = pipeline
            .take_stdin()
            .ok_or_else(|| CaptureError::RecorderStart("no stdin".into()))?;
        let mut stdout = pipeline
            .take_stdout()
            .ok_or_else(|| CaptureError::RecorderStart("no stdout".into()))?;

        let (tx, rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Box::new(FfmpegRecorder {
            pipeline,
            stdin: Some(stdin),
            chunks: rx,
            reader: Some(reader),
        }))
    }
}

struct FfmpegRecorder {
    pipeline: Pipeline,
    stdin: Option<ChildStdin>,
    chunks: Receiver<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
}

impl RecorderHandle for FfmpegRecorder {
    fn write_frame(&mut self, rgba: &[u8]) -> Result<(), CaptureError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CaptureError::Recorder("recorder input closed".into()))?;
        stdin.write_all(rgba).map_err(|e| {
            let stderr = self.pipeline.take_stderr_output().join("\n");
            CaptureError::Recorder(if stderr.is_empty() { e.to_string() } else { stderr })
        })
    }

    fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        self.chunks.try_iter().collect()
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<Vec<u8>>, CaptureError> {
        // closing stdin ends the input; ffmpeg flushes and exits
        drop(self.stdin.take());
        let status = self.pipeline.wait()?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        let rest: Vec<Vec<u8>> = self.chunks.try_iter().collect();
        if !status.success() {
            let stderr = self.pipeline.take_stderr_output().join("\n");
            return Err(CaptureError::Recorder(format!(
                "ffmpeg exited with {:?}: {}",
                status.code(),
                stderr
            )));
        }
        Ok(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::recorder::{pick_mime, DEFAULT_TIMESLICE_MS};
    use crate::source::{DeviceInput, MediaTrack, TrackKind};
    use crate::stage::Stage;

    const LISTING: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D libvpx               libvpx VP8 (codec vp8)
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libopus              libopus Opus (codec opus)
";

    fn options(mime: &str) -> RecorderOptions {
        RecorderOptions {
            mime: mime.to_string(),
            bits_per_second: 2_500_000,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
        }
    }

    #[test]
    fn test_parse_encoders() {
        let encoders = parse_encoders(LISTING);
        assert_eq!(encoders, vec!["libx264", "libvpx", "aac", "libopus"]);
    }

    #[test]
    fn test_type_support_from_encoders() {
        let backend = FfmpegRecorderBackend::with_encoders(parse_encoders(LISTING), true);
        assert!(backend.is_type_supported("video/mp4;codecs=h264,aac"));
        assert!(!backend.is_type_supported("video/webm;codecs=vp9,opus"));
        assert!(backend.is_type_supported("video/webm;codecs=vp8,opus"));
        assert!(!backend.is_type_supported("video/ogg"));

        let vp8_only = FfmpegRecorderBackend::with_encoders(vec!["libvpx".into()], true);
        assert_eq!(
            pick_mime(|m| vp8_only.is_type_supported(m)),
            Some("video/webm;codecs=vp8,opus")
        );

        let missing = FfmpegRecorderBackend::with_encoders(parse_encoders(LISTING), false);
        assert!(!missing.is_type_supported("video/mp4"));
    }

    #[test]
    fn test_args_video_only_mp4() {
        let backend = FfmpegRecorderBackend::with_encoders(parse_encoders(LISTING), true);
        let stage = Stage::new(320, 426).unwrap();
        let stream = CaptureStream::new(&stage, 30);
        let args = backend.build_args(&stream, &options("video/mp4;codecs=h264,aac")).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-s 320x426"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-b:v 2500000"));
        assert!(joined.contains("empty_moov"));
        assert!(!joined.contains("-c:a"));
        assert!(joined.ends_with("-f mp4 -"));
    }

    #[test]
    fn test_args_with_microphone() {
        let backend = FfmpegRecorderBackend::with_encoders(parse_encoders(LISTING), true);
        let stage = Stage::new(320, 426).unwrap();
        let mut stream = CaptureStream::new(&stage, 16);
        stream.add_audio_track(MediaTrack::new(TrackKind::Audio, "mic").with_device(DeviceInput {
            format: "alsa".into(),
            target: "default".into(),
        }));
        let args = backend.build_args(&stream, &options("video/webm;codecs=vp8,opus")).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-f alsa -i default"));
        assert!(joined.contains("-c:a libopus"));
        assert!(joined.contains("-shortest"));
        assert!(!joined.contains("movflags"));
        assert!(joined.ends_with("-f webm -"));
    }

    #[test]
    fn test_record_real_clip() {
        let backend = FfmpegRecorderBackend::probe();
        let Some(mime) = pick_mime(|m| backend.is_type_supported(m)) else {
            println!("SKIP: no usable FFmpeg encoder");
            return;
        };
        let mut backend = backend;
        let stage = Stage::new(320, 426).unwrap();
        let stream = CaptureStream::new(&stage, 10);
        let mut handle = backend.start(&stream, &options(mime)).unwrap();
        let frame = stage.to_rgba();
        for _ in 0..10 {
            handle.write_frame(&frame).unwrap();
        }
        let bytes: usize = handle.finish().unwrap().iter().map(Vec::len).sum();
        assert!(bytes > 0);
    }
}
