//! Task records and the in-memory task store.
//!
//! The store is the single owner of every [`Task`]: callers get cloned
//! snapshots and mutate only through [`TaskStore::transition`] and its named
//! conveniences. Records live for the lifetime of the store; there is no
//! eviction.
//!
//! ## State machine
//!
//! ```text
//! pending ──▶ processing ──▶ completed
//!                       └──▶ failed
//! ```
//!
//! Any other edge is rejected with [`ConvertError::InvalidTransition`], which
//! makes terminal states write-once.

use crate::error::ConvertError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    fn can_become(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One submitted conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub source_relative_path: String,
    /// As declared or inferred; lower-cased only where it is used.
    pub source_format: String,
    pub target_format: String,
    pub source_filename: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to register a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub source_relative_path: String,
    pub source_format: String,
    pub target_format: String,
    pub source_filename: String,
}

/// Fields merged into a task by [`TaskStore::transition`].
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Shared, cloneable handle to the task registry.
///
/// Reads take a shared lock, so status polls never wait on one another.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task in `pending`.
    pub async fn create(&self, new: NewTask) -> Result<Task, ConvertError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&new.id) {
            return Err(ConvertError::DuplicateTask { id: new.id });
        }
        let now = Utc::now();
        let task = Task {
            id: new.id,
            source_path: new.source_path,
            source_relative_path: new.source_relative_path,
            source_format: new.source_format,
            target_format: new.target_format,
            source_filename: new.source_filename,
            status: TaskStatus::Pending,
            output_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    /// Move a task to `status`, merging `update` and refreshing `updated_at`.
    ///
    /// The output path is kept only for `completed` and the error only for
    /// `failed`, so a snapshot never carries both.
    pub async fn transition(
        &self,
        id: Uuid,
        status: TaskStatus,
        update: TaskUpdate,
    ) -> Result<Task, ConvertError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id)
            .ok_or(ConvertError::TaskNotFound { id })?;

        if !task.status.can_become(status) {
            return Err(ConvertError::InvalidTransition {
                id,
                from: task.status,
                to: status,
            });
        }

        task.status = status;
        task.output_path = match status {
            TaskStatus::Completed => update.output_path.or(task.output_path.take()),
            _ => None,
        };
        task.error = match status {
            TaskStatus::Failed => update.error.or(task.error.take()),
            _ => None,
        };
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    pub async fn set_processing(&self, id: Uuid) -> Result<Task, ConvertError> {
        self.transition(id, TaskStatus::Processing, TaskUpdate::default())
            .await
    }

    pub async fn attach_result(
        &self,
        id: Uuid,
        output_path: PathBuf,
    ) -> Result<Task, ConvertError> {
        let update = TaskUpdate {
            output_path: Some(output_path),
            error: None,
        };
        self.transition(id, TaskStatus::Completed, update).await
    }

    pub async fn attach_error(
        &self,
        id: Uuid,
        message: impl Into<String>,
    ) -> Result<Task, ConvertError> {
        let update = TaskUpdate {
            output_path: None,
            error: Some(message.into()),
        };
        self.transition(id, TaskStatus::Failed, update).await
    }

    pub async fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// All tasks, oldest first.
    pub async fn list(&self) -> Vec<Task> {
        let mut all: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        all.sort_by_key(|t| t.created_at);
        all
    }
}
