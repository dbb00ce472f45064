//! Save sink: hand a finished blob to a share target, falling back to a
//! download directory.
//!
//! Saving is best effort. Failures are logged and reported as an outcome,
//! never raised to the session.

use std::fs;
use std::path::{Path, PathBuf};

use crate::blob::MediaBlob;
use crate::pipeline::run_to_completion;

/// Errors from individual save routes.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("share target cannot take '{0}'")]
    NotShareable(String),
    #[error("share failed: {0}")]
    Share(String),
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How a save ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Handed to the share target
    Shared,
    /// Written to disk
    Downloaded(PathBuf),
    /// Every route failed
    Failed,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        !matches!(self, SaveOutcome::Failed)
    }
}

/// Where finished captures go.
pub trait SaveSink {
    fn save(&mut self, blob: &MediaBlob, filename: &str) -> SaveOutcome;
}

/// A native-share style destination.
pub trait ShareTarget {
    fn can_share(&self, blob: &MediaBlob, filename: &str) -> bool;
    fn share(&mut self, blob: &MediaBlob, filename: &str) -> Result<(), SaveError>;
}

/// Writes blobs into a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The user's download directory, or the working directory.
    pub fn default_dir() -> PathBuf {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `blob` as `filename`, creating the directory if needed.
    pub fn write(&self, blob: &MediaBlob, filename: &str) -> Result<PathBuf, SaveError> {
        fs::create_dir_all(&self.dir).map_err(|source| SaveError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(filename);
        fs::write(&path, &blob.bytes).map_err(|source| SaveError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl SaveSink for DownloadDir {
    fn save(&mut self, blob: &MediaBlob, filename: &str) -> SaveOutcome {
        match self.write(blob, filename) {
            Ok(path) => SaveOutcome::Downloaded(path),
            Err(e) => {
                log::warn!("{}", e);
                SaveOutcome::Failed
            }
        }
    }
}

/// Shares by running an external command with the staged file path as
/// its last argument (for example `xdg-open` or `open`).
#[derive(Debug, Clone)]
pub struct CommandShare {
    program: String,
    args: Vec<String>,
    staging: PathBuf,
}

impl CommandShare {
    /// Parse a whitespace-separated command line. `None` for an empty one.
    pub fn parse(command: &str, staging: impl Into<PathBuf>) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            staging: staging.into(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ShareTarget for CommandShare {
    fn can_share(&self, blob: &MediaBlob, _filename: &str) -> bool {
        !blob.is_empty()
    }

    fn share(&mut self, blob: &MediaBlob, filename: &str) -> Result<(), SaveError> {
        let path = DownloadDir::new(&self.staging).write(blob, filename)?;
        let path_arg = path.to_string_lossy().into_owned();
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        args.push(&path_arg);
        run_to_completion(&self.program, &args)
            .map(|_| ())
            .map_err(|e| SaveError::Share(e.to_string()))
    }
}

/// Share first when possible, otherwise (or on failure) download.
pub struct ShareThenDownload {
    share: Option<Box<dyn ShareTarget>>,
    download: Option<DownloadDir>,
}

impl std::fmt::Debug for ShareThenDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareThenDownload")
            .field("share", &self.share.is_some())
            .field("download", &self.download)
            .finish()
    }
}

impl ShareThenDownload {
    pub fn new(share: Option<Box<dyn ShareTarget>>, download: Option<DownloadDir>) -> Self {
        Self { share, download }
    }
}

impl SaveSink for ShareThenDownload {
    fn save(&mut self, blob: &MediaBlob, filename: &str) -> SaveOutcome {
        if let Some(share) = self.share.as_mut() {
            if share.can_share(blob, filename) {
                match share.share(blob, filename) {
                    Ok(()) => return SaveOutcome::Shared,
                    Err(e) => log::warn!("Share failed, falling back to download: {}", e),
                }
            }
        }
        match self.download.as_mut() {
            Some(download) => download.save(blob, filename),
            None => SaveOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Share {
        accept: bool,
        fail: bool,
        calls: usize,
    }

    impl ShareTarget for Share {
        fn can_share(&self, _blob: &MediaBlob, _filename: &str) -> bool {
            self.accept
        }

        fn share(&mut self, _blob: &MediaBlob, _filename: &str) -> Result<(), SaveError> {
            self.calls += 1;
            if self.fail {
                Err(SaveError::Share("dismissed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn blob() -> MediaBlob {
        MediaBlob::new("image/png", vec![1, 2, 3])
    }

    #[test]
    fn test_download_writes_file() {
        let dir = tempdir().unwrap();
        let mut sink = DownloadDir::new(dir.path().join("nested"));
        let outcome = sink.save(&blob(), "facelab-1.png");
        let SaveOutcome::Downloaded(path) = outcome else {
            panic!("expected a download");
        };
        assert_eq!(fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_share_wins_when_available() {
        let dir = tempdir().unwrap();
        let share = Share {
            accept: true,
            fail: false,
            calls: 0,
        };
        let mut sink = ShareThenDownload::new(Some(Box::new(share)), Some(DownloadDir::new(dir.path())));
        assert_eq!(sink.save(&blob(), "a.png"), SaveOutcome::Shared);
        assert!(!dir.path().join("a.png").exists());
    }

    #[test]
    fn test_share_failure_falls_back_to_download() {
        let dir = tempdir().unwrap();
        let share = Share {
            accept: true,
            fail: true,
            calls: 0,
        };
        let mut sink = ShareThenDownload::new(Some(Box::new(share)), Some(DownloadDir::new(dir.path())));
        assert!(matches!(sink.save(&blob(), "b.png"), SaveOutcome::Downloaded(_)));
        assert!(dir.path().join("b.png").exists());
    }

    #[test]
    fn test_unshareable_skips_share() {
        let dir = tempdir().unwrap();
        let share = Share {
            accept: false,
            fail: false,
            calls: 0,
        };
        let mut sink = ShareThenDownload::new(Some(Box::new(share)), Some(DownloadDir::new(dir.path())));
        assert!(matches!(sink.save(&blob(), "c.png"), SaveOutcome::Downloaded(_)));
    }

    #[test]
    fn test_everything_failing_is_reported() {
        let mut sink = ShareThenDownload::new(None, None);
        let outcome = sink.save(&blob(), "d.png");
        assert_eq!(outcome, SaveOutcome::Failed);
        assert!(!outcome.is_saved());
    }

    #[test]
    fn test_command_share_parse() {
        let share = CommandShare::parse("xdg-open --flag", "/tmp").unwrap();
        assert_eq!(share.program(), "xdg-open");
        assert!(CommandShare::parse("   ", "/tmp").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_share_runs_program() {
        let dir = tempdir().unwrap();
        let mut share = CommandShare::parse("true", dir.path()).unwrap();
        share.share(&blob(), "e.png").unwrap();
        assert!(dir.path().join("e.png").exists());

        let mut failing = CommandShare::parse("false", dir.path()).unwrap();
        assert!(matches!(failing.share(&blob(), "f.png"), Err(SaveError::Share(_))));
    }
}
