use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::debug;

use super::error_responses::ApiError;

pub async fn not_found() -> ApiError {
    debug!("backend router: not_found handler invoked");
    ApiError::not_found("Route")
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
