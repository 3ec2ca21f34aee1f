use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::job::JobError;

/// API错误类型
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(err: impl Into<anyhow::Error>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: err.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": format!("{:#}", self.error) }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        let status = match error.downcast_ref::<JobError>() {
            Some(JobError::NotFound | JobError::NoResultFile) => StatusCode::NOT_FOUND,
            Some(JobError::NotCompleted) => StatusCode::PRECONDITION_FAILED,
            Some(JobError::InvalidResultKind(_) | JobError::InvalidDirectory(_)) => {
                StatusCode::BAD_REQUEST
            }
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
