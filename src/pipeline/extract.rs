//! PDF text extraction for the pandoc strategy.
//!
//! pandoc cannot read PDF, so PDF sources are reduced to their text layer
//! and handed over as markdown. The work sits behind [`TextExtractor`] so the
//! pipeline can be driven without a pdfium library present.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state; loading a document and
//! walking its pages is CPU-bound and must not run on a Tokio worker thread.

use crate::error::ConvertError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Extracts the text of each page from an in-memory PDF.
///
/// Implementations are called from a blocking thread.
pub trait TextExtractor: Send + Sync {
    /// One string per page, in page order. The error is a human-readable detail.
    fn extract_pages(&self, pdf: Vec<u8>) -> Result<Vec<String>, String>;
}

/// Production extractor backed by pdfium-render.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    lib_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    /// Bind to the library at `lib_path`, or the system library when `None`.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match &self.lib_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| format!("PDF engine unavailable: {:?}", e))?;
        Ok(Pdfium::new(bindings))
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract_pages(&self, pdf: Vec<u8>) -> Result<Vec<String>, String> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_vec(pdf, None)
            .map_err(|e| format!("{:?}", e))?;

        let pages = document.pages();
        let mut out = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| format!("page {}: {:?}", idx + 1, e))?;
            out.push(text.all());
        }
        Ok(out)
    }
}

/// Read `pdf_path` fully, extract every page and join them with a blank line.
pub async fn extract_text(
    extractor: Arc<dyn TextExtractor>,
    pdf_path: &Path,
) -> Result<String, ConvertError> {
    let bytes = tokio::fs::read(pdf_path).await?;
    debug!("Extracting text from {} ({} bytes)", pdf_path.display(), bytes.len());

    let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(bytes))
        .await
        .map_err(|e| ConvertError::SourceExtractionFailure {
            path: pdf_path.to_path_buf(),
            detail: format!("extraction task panicked: {}", e),
        })?
        .map_err(|detail| ConvertError::SourceExtractionFailure {
            path: pdf_path.to_path_buf(),
            detail,
        })?;

    info!("Extracted {} pages from {}", pages.len(), pdf_path.display());
    Ok(pages.join("\n\n"))
}
