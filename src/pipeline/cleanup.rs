//! Prepared sources and their release guard.
//!
//! Every stage that stages an input (legacy normalisation, PDF extraction)
//! hands back a [`PreparedSource`]: a working path, the format that path is
//! in, and a [`Cleanup`] that removes whatever the stage created.
//!
//! The orchestrator calls [`Cleanup::release`] explicitly, innermost stage
//! first. If a future is dropped or a stage panics before that happens, the
//! guard's `Drop` performs the same removal synchronously, so intermediates
//! never outlive the task. Removal errors are logged and swallowed; they must
//! never replace the error that ended the task.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A staged input for the next pipeline stage.
#[derive(Debug)]
pub struct PreparedSource {
    pub path: PathBuf,
    pub format: String,
    pub cleanup: Cleanup,
}

impl PreparedSource {
    /// The input as-is, with nothing to clean up.
    pub fn pass_through(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            cleanup: Cleanup::none(),
        }
    }
}

#[derive(Debug)]
enum Action {
    RemoveFile(PathBuf),
    RemoveDir(TempDir),
}

/// Runs its removal at most once: on [`release`](Self::release) or on drop.
#[derive(Debug, Default)]
#[must_use = "dropping a Cleanup removes the staged files immediately"]
pub struct Cleanup {
    action: Option<Action>,
}

impl Cleanup {
    pub fn none() -> Self {
        Self { action: None }
    }

    /// Delete `path` when released.
    pub fn remove_file(path: impl Into<PathBuf>) -> Self {
        Self {
            action: Some(Action::RemoveFile(path.into())),
        }
    }

    /// Recursively delete the scratch directory when released.
    pub fn remove_dir(dir: TempDir) -> Self {
        Self {
            action: Some(Action::RemoveDir(dir)),
        }
    }

    /// Path this guard will remove, if any.
    pub fn target(&self) -> Option<&Path> {
        match &self.action {
            Some(Action::RemoveFile(p)) => Some(p),
            Some(Action::RemoveDir(d)) => Some(d.path()),
            None => None,
        }
    }

    /// Best-effort asynchronous removal.
    pub async fn release(mut self) {
        match self.action.take() {
            Some(Action::RemoveFile(path)) => {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove intermediate {}: {}", path.display(), e);
                    }
                } else {
                    debug!("Removed intermediate {}", path.display());
                }
            }
            Some(Action::RemoveDir(dir)) => {
                let path = dir.path().to_path_buf();
                // Detach from TempDir so removal happens on the async fs pool.
                let owned = dir.keep();
                if let Err(e) = tokio::fs::remove_dir_all(&owned).await {
                    warn!("Failed to remove scratch dir {}: {}", path.display(), e);
                } else {
                    debug!("Removed scratch dir {}", path.display());
                }
            }
            None => {}
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        match self.action.take() {
            Some(Action::RemoveFile(path)) => {
                let _ = std::fs::remove_file(path);
            }
            // TempDir removes itself on drop.
            Some(Action::RemoveDir(dir)) => drop(dir),
            None => {}
        }
    }
}
