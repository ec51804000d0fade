//! Per-strategy source staging.
//!
//! Only the pandoc strategy stages anything: a PDF source is reduced to an
//! intermediate markdown file in the output directory, named after the
//! original file and the task id so concurrent tasks never collide.

use crate::error::ConvertError;
use crate::pipeline::cleanup::{Cleanup, PreparedSource};
use crate::pipeline::extract::{extract_text, TextExtractor};
use crate::pipeline::format::intermediate_filename;
use crate::pipeline::strategy::Strategy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct SourcePreparer {
    output_dir: PathBuf,
    extractor: Arc<dyn TextExtractor>,
}

impl SourcePreparer {
    pub fn new(output_dir: impl Into<PathBuf>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extractor,
        }
    }

    /// Stage `source` (already normalised) for `strategy`.
    ///
    /// `source_filename` and `task_id` name the intermediate file.
    pub async fn prepare(
        &self,
        strategy: Strategy,
        source: &Path,
        source_format: &str,
        source_filename: &str,
        task_id: &str,
    ) -> Result<PreparedSource, ConvertError> {
        let is_pdf = source_format.trim().eq_ignore_ascii_case("pdf");
        if strategy != Strategy::Pandoc || !is_pdf {
            return Ok(PreparedSource::pass_through(source, source_format));
        }

        // Nothing is written until extraction succeeds, so a failure leaves
        // no intermediate behind.
        let text = extract_text(Arc::clone(&self.extractor), source).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(intermediate_filename(source_filename, task_id));
        let cleanup = Cleanup::remove_file(&path);
        tokio::fs::write(&path, text.as_bytes()).await?;
        debug!("Wrote intermediate markdown {}", path.display());

        Ok(PreparedSource {
            path,
            format: "markdown".to_string(),
            cleanup,
        })
    }
}

impl std::fmt::Debug for SourcePreparer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourcePreparer")
            .field("output_dir", &self.output_dir)
            .field("extractor", &"<dyn TextExtractor>")
            .finish()
    }
}
