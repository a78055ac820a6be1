use crate::services::derivative::PipelineError;
use crate::services::transformer::TransformError;
use crate::utils::validation::RequestValidationError;
use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Upper bound on raster tool output echoed back to the caller
pub const MAX_DIAGNOSTIC_LEN: usize = 512;

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    pub status_code: u16,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("File parameter not specified")]
    MissingParameter,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<RequestValidationError> for AppError {
    fn from(err: RequestValidationError) -> Self {
        match err {
            RequestValidationError::MissingFilename => AppError::MissingParameter,
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::SourceNotFound { key } => {
                AppError::NotFound(format!("Source image '{}' does not exist", key))
            }
            PipelineError::Storage { .. } => AppError::Storage(err.to_string()),
            PipelineError::Transform(TransformError::Failed { status, stderr }) => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    AppError::Transform(format!("raster tool exited with {}", status))
                } else {
                    AppError::Transform(stderr.to_string())
                }
            }
            PipelineError::Transform(other) => AppError::Transform(other.to_string()),
            PipelineError::Scratch(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::MissingParameter => (
                StatusCode::CONFLICT,
                "File parameter not specified".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Transform(msg) => {
                tracing::error!("Transform error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!(
                        "Image transformation failed: {}",
                        truncate_diagnostic(&msg)
                    ),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Object storage request failed".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            message,
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

fn truncate_diagnostic(msg: &str) -> &str {
    match msg.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        Some((end, _)) => &msg[..end],
        None => msg,
    }
}
