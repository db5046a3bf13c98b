//! The Query API (C9): `POST /tasks`, `GET /tasks`, `GET /tasks/{id}` — the
//! three endpoints from spec §4.9, grounded in the teacher's
//! `routes/captures.rs` `capture_batch`/`browse_captures`/`get_capture_url`
//! handler shapes.

use std::sync::Arc;

use apalis::prelude::Storage as ApalisStorage;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use transcode_core::domain::{Task, TaskStatus};
use transcode_core::jobs::AnalyzeJob;
use transcode_core::repository;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", get(get_task))
}

/// The HTTP task-record shape from spec §6, verbatim.
#[derive(Debug, Serialize)]
struct TaskResponse {
    id: i64,
    status: TaskStatus,
    source_file: String,
    source_size: i64,
    output_file: Option<String>,
    output_size: Option<i64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    download_url: Option<String>,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            status: t.status,
            source_file: t.source_file,
            source_size: t.source_size,
            output_file: t.output_file,
            output_size: t.output_size,
            error_message: t.error_message,
            created_at: t.created_at,
            updated_at: t.updated_at,
            download_url: None,
        }
    }
}

/// Maps a sniffed video MIME type to the extension used in the object-store
/// key (`source/<uuid><ext>`, spec §6). Falls back to `.bin` for a video
/// container `infer` recognizes but this list doesn't name explicitly.
fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/quicktime" => ".mov",
        "video/x-matroska" => ".mkv",
        "video/x-msvideo" => ".avi",
        "video/mpeg" => ".mpeg",
        "video/x-flv" => ".flv",
        _ => ".bin",
    }
}

/// `POST /tasks` — multipart file upload. Detects content type from the
/// leading bytes (spec §4.9); rejects non-`video/*` with 400. Uploads to
/// `source/<uuid><ext>`, creates the task, and enqueues the `Analyze` stage
/// of the chain (the Analyze handler enqueues `Transcode` itself once it
/// completes, per spec §4.8's server-side chaining).
async fn create_task(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
        .ok_or_else(|| ApiError::bad_request("missing file field"))?;

    let body = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;

    let kind = infer::get(&body);
    let mime = kind.map(|k| k.mime_type()).unwrap_or("application/octet-stream");
    if !mime.starts_with("video/") {
        return Err(ApiError::bad_request(format!("file must be a video, detected {mime}")));
    }

    let source_key = format!("source/{}{}", Uuid::new_v4().simple(), extension_for_mime(mime));
    state.storage.upload(&source_key, body.clone(), mime).await?;

    let task = repository::create(&state.db, &source_key, body.len() as i64).await?;

    let mut queue = state.analyze_queue.clone();
    if let Err(e) = ApalisStorage::push(&mut queue, AnalyzeJob { task_id: task.id, source_key: task.source_file.clone() }).await {
        tracing::error!(task_id = task.id, error = %e, "failed to enqueue analyze job");
        return Err(ApiError::bad_request("failed to schedule processing"));
    }

    Ok((StatusCode::CREATED, Json(task.into())))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    statuses: Option<String>,
    limit: Option<i64>,
    skip: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ListTasksResponse {
    tasks: Vec<TaskResponse>,
    total: i64,
}

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// `GET /tasks?statuses=…&limit&skip` — paginated, ordered by
/// `created_at DESC` (spec §4.9).
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListTasksResponse>, ApiError> {
    let statuses = query
        .statuses
        .as_deref()
        .map(|s| {
            s.split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<TaskStatus>().map_err(ApiError::bad_request))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let skip = query.skip.unwrap_or(0).max(0);

    let page = repository::list(&state.db, statuses.as_deref(), limit, skip).await?;
    Ok(Json(ListTasksResponse { tasks: page.tasks.into_iter().map(TaskResponse::from).collect(), total: page.total }))
}

/// `GET /tasks/{id}` — returns the task; when status is `COMPLETED`,
/// attaches a freshly-generated download URL (spec §4.9, testable
/// property 6: non-null iff completed).
async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Json<TaskResponse>, ApiError> {
    let task = repository::get(&state.db, id).await?;
    let mut response = TaskResponse::from(task.clone());

    if task.status == TaskStatus::Completed {
        if let Some(output_file) = &task.output_file {
            let url = state.storage.presigned_download_url(output_file, state.presigned_url_expiration).await?;
            response.download_url = Some(url);
        }
    }

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp4_upload_gets_mp4_extension() {
        assert_eq!(extension_for_mime("video/mp4"), ".mp4");
    }

    #[test]
    fn unrecognized_video_container_falls_back_to_bin() {
        assert_eq!(extension_for_mime("video/x-made-up"), ".bin");
    }
}
