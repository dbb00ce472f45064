//! FFmpeg process management.
//!
//! Camera capture, clip playback and the recorder all run FFmpeg as a child
//! process. This module handles spawning, stderr collection and termination.

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Errors that can occur while driving an FFmpeg process
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// FFmpeg executable not found
    #[error("FFmpeg not found. Please install it with:\n\n    brew install ffmpeg\n")]
    FfmpegNotFound,
    /// Failed to spawn the process
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        source: std::io::Error,
    },
    /// Process exited with non-zero status
    #[error("{program} exited with code {exit_code:?}\n{stderr}")]
    ProcessFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    /// I/O error while talking to the process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running FFmpeg (or ffprobe) child process.
pub struct Pipeline {
    program: String,
    child: Child,
    stderr_thread: Option<JoinHandle<Vec<String>>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Spawn `program` with piped stdout and stderr.
    ///
    /// When `with_stdin` is set the child's stdin is piped too, otherwise it is null.
    pub fn spawn(program: &str, args: &[String], with_stdin: bool) -> Result<Self, PipelineError> {
        log::debug!("Spawning {} {}", program, args.join(" "));
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if with_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| spawn_error(program, e))?;

        let tag = program.to_string();
        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                let mut lines = Vec::new();
                for line in reader.lines() {
                    match line {
                        Ok(l) => {
                            log::trace!("[{}] {}", tag, l);
                            lines.push(l);
                        }
                        Err(_) => break,
                    }
                }
                lines
            })
        });

        Ok(Pipeline {
            program: program.to_string(),
            child,
            stderr_thread,
        })
    }

    /// Take ownership of the child's stdin.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the child's stdout.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Check if the process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Wait for the process to complete and return the exit status.
    pub fn wait(&mut self) -> Result<ExitStatus, PipelineError> {
        self.child.wait().map_err(PipelineError::Io)
    }

    /// Request a graceful shutdown.
    ///
    /// Sends SIGINT and waits up to two seconds before killing the process.
    pub fn shutdown(&mut self) -> Result<ExitStatus, PipelineError> {
        if let Ok(Some(status)) = self.child.try_wait() {
            return Ok(status);
        }

        #[cfg(unix)]
        {
            // SAFETY: the pid belongs to a child we spawned and have not reaped yet.
            unsafe {
                libc::kill(self.child.id() as i32, libc::SIGINT);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }

        let start = Instant::now();
        let timeout = Duration::from_secs(2);
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if start.elapsed() > timeout {
                        let _ = self.child.kill();
                        return self.child.wait().map_err(PipelineError::Io);
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                Err(e) => return Err(PipelineError::Io(e)),
            }
        }
    }

    /// Get the collected stderr output after the process has finished.
    pub fn take_stderr_output(&mut self) -> Vec<String> {
        self.stderr_thread
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.shutdown();
        }
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> PipelineError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PipelineError::FfmpegNotFound
    } else {
        PipelineError::SpawnFailed {
            program: program.to_string(),
            source: e,
        }
    }
}

/// Run a short-lived command to completion and collect its output.
pub fn run_to_completion(program: &str, args: &[&str]) -> Result<Output, PipelineError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(PipelineError::ProcessFailed {
            program: program.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Whether an `ffmpeg` binary can be executed.
pub fn ffmpeg_available() -> bool {
    run_to_completion("ffmpeg", &["-hide_banner", "-version"]).is_ok()
}

/// Default FFmpeg input format for capture devices on this platform.
pub fn platform_capture_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

/// Default FFmpeg input format for microphones on this platform.
pub fn platform_audio_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "alsa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_ffmpeg_version() {
        if !ffmpeg_available() {
            println!("SKIP: ffmpeg not installed");
            return;
        }
        let mut pipeline = Pipeline::spawn("ffmpeg", &["-version".to_string()], false)
            .expect("Should be able to spawn ffmpeg -version");
        let status = pipeline.wait().unwrap();
        assert!(status.success(), "ffmpeg -version should succeed");
        let _ = pipeline.take_stderr_output();
    }

    #[test]
    fn test_missing_program_maps_to_not_found() {
        let err = Pipeline::spawn("definitely-not-ffmpeg-xyz", &[], false).unwrap_err();
        assert!(matches!(err, PipelineError::FfmpegNotFound));
    }

    #[test]
    fn test_process_failed_error() {
        let err = PipelineError::ProcessFailed {
            program: "ffmpeg".into(),
            exit_code: Some(1),
            stderr: "Error message".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("1"));
        assert!(msg.contains("Error message"));
    }

    #[test]
    fn test_platform_formats_are_known() {
        assert!(["avfoundation", "dshow", "v4l2"].contains(&platform_capture_format()));
        assert!(["avfoundation", "dshow", "alsa"].contains(&platform_audio_format()));
    }
}
