//! Error types for the edgequake-docconv library.
//!
//! Two distinct error types reflect two distinct audiences:
//!
//! * [`ConvertError`]: everything that can go wrong while registering or
//!   running a conversion task. Inside the pipeline these are caught at the
//!   orchestrator boundary and stored on the task as its `error` string, so a
//!   failing external tool never takes the service down.
//!
//! * [`DownloadError`]: the two signals a download collaborator must render
//!   differently: the task does not exist, or it exists but has no artifact
//!   yet.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::task::TaskStatus;

/// All errors produced by the conversion core.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── External tool errors ──────────────────────────────────────────────
    /// The configured executable could not be found on disk or on `PATH`.
    #[error("{tool} executable '{program}' was not found.\nInstall it or point {env_var} at the executable.")]
    ToolNotFound {
        tool: &'static str,
        program: String,
        env_var: &'static str,
    },

    /// The tool ran and exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ToolExecutionFailure { tool: &'static str, message: String },

    /// The tool did not finish within the configured timeout and was killed.
    #[error("{tool} did not finish within {secs}s and was terminated")]
    ToolTimeout { tool: &'static str, secs: u64 },

    /// The office converter exited cleanly but left no file with the
    /// expected extension behind.
    #[error("office converter produced no '.{extension}' file in '{dir}'")]
    ToolOutputMissing { extension: String, dir: PathBuf },

    // ── Source errors ─────────────────────────────────────────────────────
    /// Text extraction from a PDF source failed (corrupt, encrypted, or the
    /// PDF engine could not be loaded).
    #[error("Failed to extract text from '{path}': {detail}")]
    SourceExtractionFailure { path: PathBuf, detail: String },

    // ── Task store errors ─────────────────────────────────────────────────
    /// No task is registered under the given id.
    #[error("No task was found with id {id}")]
    TaskNotFound { id: Uuid },

    /// A task with the same id is already registered.
    #[error("Task {id} already exists")]
    DuplicateTask { id: Uuid },

    /// The requested status change is not an edge of the task state machine.
    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a task's artifact cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Unknown task id, or the output file has vanished from disk.
    #[error("No converted file was found for task {0}")]
    NotFound(Uuid),

    /// The task exists but has not reached `completed`.
    #[error("Task {id} is not ready for download (status: {status})")]
    NotReady { id: Uuid, status: TaskStatus },
}
