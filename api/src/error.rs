//! Route-handler error conversion: every handler returns `Result<_,
//! ApiError>`, and `From<CoreError>` maps the core error taxonomy onto the
//! HTTP status taxonomy from spec §7, emitting a `tracing` event with a
//! correlation id for anything uncaught.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use transcode_core::error::CoreError;

/// The taxonomy from spec §7: input errors -> 400, storage errors -> 502,
/// everything else uncaught -> 500 with a correlation id in the logs.
pub struct ApiError {
    status: StatusCode,
    message: String,
    correlation_id: Option<Uuid>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into(), correlation_id: None }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Storage(_) => {
                tracing::error!(error = %e, "storage error");
                Self { status: StatusCode::BAD_GATEWAY, message: format!("storage error: {e}"), correlation_id: None }
            }
            CoreError::TaskNotFound(id) => {
                Self { status: StatusCode::NOT_FOUND, message: format!("task {id} not found"), correlation_id: None }
            }
            other => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(%correlation_id, error = %other, "unexpected error");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal error".to_string(),
                    correlation_id: Some(correlation_id),
                }
            }
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<Uuid>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(ErrorBody { error: self.message, correlation_id: self.correlation_id })).into_response()
    }
}
