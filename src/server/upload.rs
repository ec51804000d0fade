//! Multipart form handling for conversion submissions.

use super::ApiError;
use crate::pipeline::format::safe_stem;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// An uploaded source saved under the upload directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub absolute_path: PathBuf,
    /// `<upload dir name>/<stored name>`
    pub relative_path: String,
    pub original_name: String,
}

/// The fields of `POST /api/v1/conversions`.
#[derive(Debug, Default)]
pub struct ConversionForm {
    pub upload: Option<StoredUpload>,
    pub source_format: Option<String>,
    pub target_format: Option<String>,
    pub filename: Option<String>,
    pub wait: bool,
}

impl ConversionForm {
    /// Delete the stored file, for requests rejected after the upload landed.
    pub async fn discard(self) {
        if let Some(upload) = self.upload {
            let _ = tokio::fs::remove_file(&upload.absolute_path).await;
        }
    }
}

fn bad_multipart(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("invalid multipart body: {e}"))
}

/// Read every field, streaming `file` to disk as it arrives.
pub async fn read_form(
    mut multipart: Multipart,
    upload_dir: &Path,
) -> Result<ConversionForm, ApiError> {
    let mut form = ConversionForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                form.discard().await;
                return Err(bad_multipart(e));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let outcome = match name.as_str() {
            "file" if form.upload.is_some() => Err(ApiError::BadRequest(
                "only one 'file' field is allowed".into(),
            )),
            "file" => store_upload(field, upload_dir).await.map(|u| {
                form.upload = Some(u);
            }),
            "source_format" | "sourceFormat" => text(field).await.map(|v| form.source_format = v),
            "target_format" | "targetFormat" => text(field).await.map(|v| form.target_format = v),
            "filename" => text(field).await.map(|v| form.filename = v),
            "wait" => text(field).await.map(|v| {
                form.wait = v.is_some_and(|s| {
                    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
                });
            }),
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            form.discard().await;
            return Err(e);
        }
    }

    Ok(form)
}

async fn text(field: Field<'_>) -> Result<Option<String>, ApiError> {
    let v = field.text().await.map_err(bad_multipart)?;
    let v = v.trim();
    Ok((!v.is_empty()).then(|| v.to_string()))
}

async fn store_upload(mut field: Field<'_>, upload_dir: &Path) -> Result<StoredUpload, ApiError> {
    let original_name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "upload".to_string());

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot create upload dir: {e}")))?;
    let dir = tokio::fs::canonicalize(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot resolve upload dir: {e}")))?;

    let stored_name = match Path::new(&original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}.{}", Uuid::new_v4(), safe_stem(&original_name), ext),
        None => format!("{}-{}", Uuid::new_v4(), safe_stem(&original_name)),
    };
    let absolute_path = dir.join(&stored_name);

    let mut file = tokio::fs::File::create(&absolute_path)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot store upload: {e}")))?;
    let mut written = 0usize;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                written += chunk.len();
                if let Err(e) = file.write_all(&chunk).await {
                    let _ = tokio::fs::remove_file(&absolute_path).await;
                    return Err(ApiError::Internal(format!("cannot store upload: {e}")));
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = tokio::fs::remove_file(&absolute_path).await;
                return Err(bad_multipart(e));
            }
        }
    }
    if let Err(e) = file.flush().await {
        let _ = tokio::fs::remove_file(&absolute_path).await;
        return Err(ApiError::Internal(format!("cannot store upload: {e}")));
    }
    debug!("Stored upload {} ({} bytes)", absolute_path.display(), written);

    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let relative_path = if dir_name.is_empty() {
        stored_name
    } else {
        format!("{dir_name}/{stored_name}")
    };

    Ok(StoredUpload {
        absolute_path,
        relative_path,
        original_name,
    })
}
