//! Task orchestration: submission, the per-task pipeline, status and download.
//!
//! ## Pipeline for one task
//!
//! ```text
//! pending ─▶ processing
//!              │
//!              ├─ 1. legacy normalisation    (scratch dir, released last)
//!              ├─ 2. strategy resolution
//!              ├─ 3. source preparation      (intermediate, released first)
//!              ├─ 4. invoke converter / simulate copy
//!              │
//!              └─▶ completed(output_path) | failed(error)
//! ```
//!
//! Every error from steps 1–4 is caught here and stored on the task; nothing
//! escapes the submission call. Both release actions run on every exit path,
//! innermost first.
//!
//! [`Orchestrator::submit`] spawns the pipeline and returns the `pending`
//! snapshot; [`Orchestrator::submit_and_wait`] runs the same pipeline inline
//! and returns the terminal snapshot.

use crate::config::{RunMode, ServiceConfig};
use crate::error::{ConvertError, DownloadError};
use crate::pipeline::cleanup::PreparedSource;
use crate::pipeline::extract::{PdfiumExtractor, TextExtractor};
use crate::pipeline::format::{infer_format, output_filename};
use crate::pipeline::invoke::{simulate, timeout_from_secs, PandocInvoker, ShortcutInvoker};
use crate::pipeline::legacy::LegacyNormalizer;
use crate::pipeline::prepare::SourcePreparer;
use crate::pipeline::strategy::{self, Strategy};
use crate::task::{NewTask, Task, TaskStatus, TaskStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// What the submission collaborator hands over for a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub source_path: PathBuf,
    pub source_relative_path: String,
    /// Inferred from the filename when absent.
    pub source_format: Option<String>,
    pub target_format: String,
    pub source_filename: String,
}

/// A task plus the link a client should use to fetch its artifact.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let download_url = (task.status == TaskStatus::Completed)
            .then(|| format!("/api/v1/tasks/{}/download", task.id));
        Self { task, download_url }
    }
}

/// A completed artifact ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub filename: String,
}

/// Drives conversion tasks. Cheap to clone; clones share one task store.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServiceConfig,
    store: TaskStore,
    normalizer: LegacyNormalizer,
    preparer: SourcePreparer,
    pandoc: PandocInvoker,
    shortcut: ShortcutInvoker,
}

impl Orchestrator {
    /// Orchestrator using pdfium for PDF text extraction.
    pub fn new(config: ServiceConfig) -> Self {
        let extractor = Arc::new(PdfiumExtractor::new(config.pdfium_lib_path.clone()));
        Self::with_extractor(config, extractor)
    }

    /// Storage directories are resolved against the current directory here,
    /// so every output and intermediate path a task records is absolute.
    pub fn with_extractor(mut config: ServiceConfig, extractor: Arc<dyn TextExtractor>) -> Self {
        config.upload_dir = absolute_dir(config.upload_dir);
        config.output_dir = absolute_dir(config.output_dir);
        let timeout = timeout_from_secs(config.tool_timeout_secs);
        let inner = Inner {
            normalizer: LegacyNormalizer::new(
                config.office_path.clone(),
                config.output_dir.clone(),
                timeout,
            ),
            preparer: SourcePreparer::new(config.output_dir.clone(), extractor),
            pandoc: PandocInvoker::new(config.pandoc_path.clone(), timeout),
            shortcut: ShortcutInvoker::new(config.shortcut_path.clone(), timeout),
            store: TaskStore::new(),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &TaskStore {
        &self.inner.store
    }

    /// Create the upload and output directories.
    pub async fn bootstrap(&self) -> Result<(), ConvertError> {
        tokio::fs::create_dir_all(&self.inner.config.upload_dir).await?;
        tokio::fs::create_dir_all(&self.inner.config.output_dir).await?;
        Ok(())
    }

    /// Register a task and run it in the background.
    pub async fn submit(&self, req: SubmitRequest) -> Result<Task, ConvertError> {
        let task = self.create_task(req).await?;
        let this = self.clone();
        let id = task.id;
        tokio::spawn(async move {
            this.run(id).await;
        });
        Ok(task)
    }

    /// Register a task and run it to completion before returning.
    pub async fn submit_and_wait(&self, req: SubmitRequest) -> Result<Task, ConvertError> {
        let task = self.create_task(req).await?;
        match self.run(task.id).await {
            Some(done) => Ok(done),
            None => Err(ConvertError::TaskNotFound { id: task.id }),
        }
    }

    /// Task snapshot with its download link.
    pub async fn status(&self, id: Uuid) -> Result<TaskView, ConvertError> {
        self.inner
            .store
            .get(id)
            .await
            .map(TaskView::from)
            .ok_or(ConvertError::TaskNotFound { id })
    }

    /// Locate a completed task's artifact.
    pub async fn download(&self, id: Uuid) -> Result<Download, DownloadError> {
        let task = self
            .inner
            .store
            .get(id)
            .await
            .ok_or(DownloadError::NotFound(id))?;

        if task.status != TaskStatus::Completed {
            return Err(DownloadError::NotReady {
                id,
                status: task.status,
            });
        }
        let path = task.output_path.ok_or(DownloadError::NotFound(id))?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(DownloadError::NotFound(id));
        }
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{id}"));
        Ok(Download { path, filename })
    }

    async fn create_task(&self, req: SubmitRequest) -> Result<Task, ConvertError> {
        let source_format = req
            .source_format
            .filter(|f| !f.trim().is_empty())
            .or_else(|| infer_format(&req.source_filename))
            .or_else(|| infer_format(&req.source_path.to_string_lossy()))
            .unwrap_or_default();

        let task = self
            .inner
            .store
            .create(NewTask {
                id: Uuid::new_v4(),
                source_path: req.source_path,
                source_relative_path: req.source_relative_path,
                source_format,
                target_format: req.target_format,
                source_filename: req.source_filename,
            })
            .await?;
        info!(
            "Accepted task {} ({} → {})",
            task.id, task.source_format, task.target_format
        );
        Ok(task)
    }

    /// Run the pipeline for `id` and record the outcome.
    ///
    /// Returns the final snapshot, or `None` if the task is unknown.
    pub async fn run(&self, id: Uuid) -> Option<Task> {
        let store = &self.inner.store;
        let task = store.get(id).await?;

        async move {
            if let Err(e) = store.set_processing(id).await {
                warn!("Not running task: {}", e);
                return store.get(id).await;
            }

            let recorded = match self.execute(&task).await {
                Ok(output) => {
                    info!("Completed → {}", output.display());
                    store.attach_result(id, output).await
                }
                Err(e) => {
                    warn!("Failed: {}", e);
                    store.attach_error(id, e.to_string()).await
                }
            };

            match recorded {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("Could not record outcome: {}", e);
                    store.get(id).await
                }
            }
        }
        .instrument(info_span!("task", %id))
        .await
    }

    async fn execute(&self, task: &Task) -> Result<PathBuf, ConvertError> {
        let config = &self.inner.config;
        tokio::fs::create_dir_all(&config.output_dir).await?;
        let output_path = config.output_dir.join(output_filename(
            &task.source_filename,
            &task.id.to_string(),
            &task.target_format,
        ));

        let normalized = match config.run_mode {
            RunMode::Simulate => PreparedSource::pass_through(&task.source_path, &task.source_format),
            RunMode::Live => {
                self.inner
                    .normalizer
                    .normalize(&task.source_format, &task.source_path)
                    .await?
            }
        };
        let PreparedSource {
            path,
            format,
            cleanup,
        } = normalized;

        let result = self.convert(task, &path, &format, &output_path).await;
        cleanup.release().await;
        result.map(|()| output_path)
    }

    async fn convert(
        &self,
        task: &Task,
        source: &Path,
        source_format: &str,
        output: &Path,
    ) -> Result<(), ConvertError> {
        let config = &self.inner.config;
        let strategy =
            strategy::resolve(config.run_mode, config.shortcut_policy, &task.target_format);
        info!("Strategy {:?} for {}", strategy, source.display());

        let PreparedSource {
            path,
            format,
            cleanup,
        } = self
            .inner
            .preparer
            .prepare(
                strategy,
                source,
                source_format,
                &task.source_filename,
                &task.id.to_string(),
            )
            .await?;

        let result = match strategy {
            Strategy::Simulate => simulate(&path, output).await,
            Strategy::Shortcut => {
                let declared = Some(format.as_str()).filter(|f| !f.trim().is_empty());
                self.inner.shortcut.convert(&path, declared, output).await
            }
            Strategy::Pandoc => {
                self.inner
                    .pandoc
                    .convert(&path, &format, &task.target_format, output)
                    .await
            }
        };
        cleanup.release().await;
        result
    }
}

fn absolute_dir(dir: PathBuf) -> PathBuf {
    match std::path::absolute(&dir) {
        Ok(abs) => abs,
        Err(e) => {
            warn!("Cannot resolve {} to an absolute path: {}", dir.display(), e);
            dir
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
