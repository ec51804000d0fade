use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use super::upload::read_form;
use super::ApiError;
use crate::orchestrator::{Orchestrator, SubmitRequest, TaskView};

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::NotFound(format!("No task was found with id {raw}")))
}

/// `POST /api/v1/conversions`
pub async fn submit_handler(
    State(orchestrator): State<Orchestrator>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TaskView>), ApiError> {
    let mut form = read_form(multipart, &orchestrator.config().upload_dir).await?;

    let Some(target_format) = form.target_format.take() else {
        form.discard().await;
        return Err(ApiError::BadRequest("missing 'target_format' field".into()));
    };
    let Some(upload) = form.upload.take() else {
        return Err(ApiError::BadRequest("missing 'file' field".into()));
    };

    let wait = form.wait;
    let req = SubmitRequest {
        source_path: upload.absolute_path,
        source_relative_path: upload.relative_path,
        source_format: form.source_format,
        target_format,
        source_filename: form.filename.unwrap_or(upload.original_name),
    };

    if wait {
        let task = orchestrator.submit_and_wait(req).await?;
        Ok((StatusCode::OK, Json(task.into())))
    } else {
        let task = orchestrator.submit(req).await?;
        Ok((StatusCode::ACCEPTED, Json(task.into())))
    }
}

/// `GET /api/v1/tasks`
pub async fn list_handler(State(orchestrator): State<Orchestrator>) -> Json<Vec<TaskView>> {
    let tasks = orchestrator.store().list().await;
    Json(tasks.into_iter().map(TaskView::from).collect())
}

/// `GET /api/v1/tasks/{task_id}`
pub async fn get_task_handler(
    State(orchestrator): State<Orchestrator>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let id = parse_id(&task_id)?;
    Ok(Json(orchestrator.status(id).await?))
}

/// `GET /api/v1/tasks/{task_id}/download`
pub async fn download_handler(
    State(orchestrator): State<Orchestrator>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&task_id)?;
    let download = orchestrator.download(id).await?;
    let bytes = tokio::fs::read(&download.path)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot read output: {e}")))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.filename.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
