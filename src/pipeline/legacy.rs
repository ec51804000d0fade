//! Legacy office format normalisation.
//!
//! pandoc does not read the binary Office formats (`.doc`, `.xls`, `.ppt`),
//! so those are first converted to their OOXML successors by a headless
//! office converter (LibreOffice `soffice`).
//!
//! Normalisation degrades gracefully: if the format is not legacy, no office
//! converter is configured, or the configured executable is not on disk, the
//! source is passed through unchanged and pandoc gets to decide.
//!
//! The "is the converter on disk" check runs once per normaliser and the
//! answer is sticky for its lifetime. A converter installed after startup is
//! picked up only by a new service instance.

use crate::error::ConvertError;
use crate::pipeline::cleanup::{Cleanup, PreparedSource};
use crate::pipeline::invoke::{run_tool, Tool};
use once_cell::sync::OnceCell;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Modern container format for a legacy office format, if `format` is one.
pub fn legacy_target(format: &str) -> Option<&'static str> {
    match format.trim().to_ascii_lowercase().as_str() {
        "doc" => Some("docx"),
        "xls" => Some("xlsx"),
        "ppt" => Some("pptx"),
        _ => None,
    }
}

#[derive(Debug)]
pub struct LegacyNormalizer {
    office_path: Option<PathBuf>,
    scratch_root: PathBuf,
    timeout: Option<Duration>,
    available: OnceCell<bool>,
}

impl LegacyNormalizer {
    /// `scratch_root` is where per-invocation scratch directories are created.
    pub fn new(
        office_path: Option<PathBuf>,
        scratch_root: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            office_path,
            scratch_root: scratch_root.into(),
            timeout,
            available: OnceCell::new(),
        }
    }

    /// Whether the configured office converter exists. Computed on first call.
    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| match &self.office_path {
            Some(path) if path.is_file() => {
                info!("Office converter found at {}", path.display());
                true
            }
            Some(path) => {
                warn!(
                    "Office converter {} not found; legacy formats will be passed through",
                    path.display()
                );
                false
            }
            None => false,
        })
    }

    /// Normalise `source_path` if `source_format` is a legacy format.
    ///
    /// On success the returned source's cleanup removes the scratch directory.
    /// On failure the scratch directory is removed before returning.
    pub async fn normalize(
        &self,
        source_format: &str,
        source_path: &Path,
    ) -> Result<PreparedSource, ConvertError> {
        let Some(target_ext) = legacy_target(source_format) else {
            return Ok(PreparedSource::pass_through(source_path, source_format));
        };
        let office = match &self.office_path {
            Some(path) if self.is_available() => path,
            _ => {
                debug!("Skipping legacy normalisation for {}", source_path.display());
                return Ok(PreparedSource::pass_through(source_path, source_format));
            }
        };

        tokio::fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix("legacy-")
            .tempdir_in(&self.scratch_root)?;
        let scratch_path = scratch.path().to_path_buf();

        info!(
            "Normalising {} ({} → {})",
            source_path.display(),
            source_format,
            target_ext
        );

        let args: Vec<OsString> = vec![
            "--headless".into(),
            "--convert-to".into(),
            target_ext.into(),
            "--outdir".into(),
            scratch_path.as_os_str().to_os_string(),
            source_path.as_os_str().to_os_string(),
        ];

        let cleanup = Cleanup::remove_dir(scratch);

        if let Err(e) = run_tool(Tool::Office, office, &args, self.timeout).await {
            cleanup.release().await;
            return Err(e);
        }

        match find_with_extension(&scratch_path, target_ext).await {
            Ok(Some(path)) => {
                debug!("Office converter produced {}", path.display());
                Ok(PreparedSource {
                    path,
                    format: target_ext.to_string(),
                    cleanup,
                })
            }
            Ok(None) => {
                cleanup.release().await;
                Err(ConvertError::ToolOutputMissing {
                    extension: target_ext.to_string(),
                    dir: scratch_path,
                })
            }
            Err(e) => {
                cleanup.release().await;
                Err(e.into())
            }
        }
    }
}

async fn find_with_extension(dir: &Path, ext: &str) -> std::io::Result<Option<PathBuf>> {
    let suffix = format!(".{}", ext.to_ascii_lowercase());
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_string_lossy().to_ascii_lowercase().ends_with(&suffix) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
