use crate::AppState;
use crate::api::error::{AppError, ErrorResponse};
use crate::api::middleware::request_id::RequestId;
use crate::models::{PipelineStage, TransformQuery};
use crate::utils::validation::parse_transform_request;
use axum::{
    Extension,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;
use uuid::Uuid;

/// Produces a lower quality / rescaled copy of a stored image and returns a
/// signed URL for it as plain text.
#[utoipa::path(
    get,
    path = "/createNewLowerQualityImage",
    params(TransformQuery),
    responses(
        (status = 200, description = "Signed URL of the derivative", body = String, content_type = "text/plain"),
        (status = 400, description = "Malformed query string, quality, scale or path", body = ErrorResponse),
        (status = 404, description = "Source image does not exist", body = ErrorResponse),
        (status = 409, description = "File parameter not specified", body = ErrorResponse),
        (status = 500, description = "Image transformation failed", body = ErrorResponse),
        (status = 502, description = "Object storage request failed", body = ErrorResponse)
    ),
    tag = "derivatives"
)]
pub async fn create_derivative(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<TransformQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        stage = %PipelineStage::Validating,
        request_id = %request_id,
        "Derivative requested for {:?}",
        query.filename
    );
    let request = parse_transform_request(&query, &state.config)?;

    let outcome = state
        .derivatives
        .create_derivative(&request, &request_id)
        .await?;

    Ok((StatusCode::OK, outcome.derivative.url).into_response())
}
