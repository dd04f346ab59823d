use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use crates::domain::value_objects::api_keys::CreateApiKeyModel;
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::ApiError,
        extractors::{ApiJson, ApiPath},
    },
    usecases::api_keys::ApiKeyUseCase,
};

pub fn routes(api_key_usecase: Arc<ApiKeyUseCase>) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", delete(revoke))
        .with_state(api_key_usecase)
}

pub async fn create(
    State(api_key_usecase): State<Arc<ApiKeyUseCase>>,
    auth: AuthUser,
    ApiJson(model): ApiJson<CreateApiKeyModel>,
) -> Result<impl IntoResponse, ApiError> {
    let created = api_key_usecase.create(auth.user_id, model).await?;
    Ok((StatusCode::CREATED, Json(json!({ "apiKey": created }))))
}

pub async fn list(
    State(api_key_usecase): State<Arc<ApiKeyUseCase>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let api_keys = api_key_usecase.list(auth.user_id).await?;
    Ok(Json(json!({ "apiKeys": api_keys })))
}

pub async fn revoke(
    State(api_key_usecase): State<Arc<ApiKeyUseCase>>,
    auth: AuthUser,
    ApiPath(api_key_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    api_key_usecase.revoke(auth.user_id, api_key_id).await?;
    Ok(Json(json!({ "success": true })))
}
