//! # edgequake-docconv
//!
//! Document conversion as a service: accept a file, pick the right external
//! converter, run it, and expose the result as a trackable, downloadable
//! task.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Task     registered as `pending`, then `processing`
//!  ├─ 2. Legacy   .doc/.xls/.ppt → OOXML via headless soffice (optional)
//!  ├─ 3. Strategy simulate | markdown shortcut | pandoc
//!  ├─ 4. Prepare  PDF → intermediate markdown (pdfium text layer)
//!  ├─ 5. Invoke   pandoc --from … --to … / markitdown / test-mode copy
//!  └─ 6. Result   `completed` with an output path, or `failed` with a message
//! ```
//!
//! Intermediates from steps 2 and 4 are removed on every exit path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docconv::{Orchestrator, ServiceConfig, SubmitRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(ServiceConfig::from_env()?);
//!     orchestrator.bootstrap().await?;
//!
//!     let task = orchestrator
//!         .submit_and_wait(SubmitRequest {
//!             source_path: "storage/uploads/report.docx".into(),
//!             source_relative_path: "uploads/report.docx".into(),
//!             source_format: None,
//!             target_format: "markdown".into(),
//!             source_filename: "report.docx".into(),
//!         })
//!         .await?;
//!     println!("{:?} {:?}", task.status, task.output_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP routes for submit / status / download |
//! | `cli`    | on      | Enables the `docconv` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RunMode, ServiceConfig, ServiceConfigBuilder, ShortcutPolicy};
pub use error::{ConvertError, DownloadError};
pub use orchestrator::{Download, Orchestrator, SubmitRequest, TaskView};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::strategy::Strategy;
pub use task::{Task, TaskStatus, TaskStore};
