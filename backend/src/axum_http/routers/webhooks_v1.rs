use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use crates::domain::value_objects::webhooks::{
    ConfigureWebhookModel, RemoveWebhookQuery, RetryWebhookModel, WebhookLogsQuery,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::api_key::{ApiKeyAuth, WebhookRead, WebhookWrite},
    axum_http::{
        error_responses::ApiError,
        extractors::{ApiJson, ApiPath, ApiQuery},
    },
    usecases::webhook_outbox::WebhookOutboxUseCase,
};

pub fn routes(webhook_outbox_usecase: Arc<WebhookOutboxUseCase>) -> Router {
    Router::new()
        .route("/", get(list).post(configure).delete(remove))
        .route("/:qr_code_id/logs", get(logs).post(retry))
        .with_state(webhook_outbox_usecase)
}

pub async fn list(
    State(webhook_outbox_usecase): State<Arc<WebhookOutboxUseCase>>,
    auth: ApiKeyAuth<WebhookRead>,
) -> Result<impl IntoResponse, ApiError> {
    let webhooks = webhook_outbox_usecase.list_configs(auth.principal()).await?;
    Ok(Json(json!({ "webhooks": webhooks })))
}

pub async fn configure(
    State(webhook_outbox_usecase): State<Arc<WebhookOutboxUseCase>>,
    auth: ApiKeyAuth<WebhookWrite>,
    ApiJson(model): ApiJson<ConfigureWebhookModel>,
) -> Result<impl IntoResponse, ApiError> {
    let configured = webhook_outbox_usecase.configure(auth.principal(), model).await?;
    Ok(Json(configured))
}

pub async fn remove(
    State(webhook_outbox_usecase): State<Arc<WebhookOutboxUseCase>>,
    auth: ApiKeyAuth<WebhookWrite>,
    ApiQuery(query): ApiQuery<RemoveWebhookQuery>,
) -> Result<impl IntoResponse, ApiError> {
    webhook_outbox_usecase
        .remove(auth.principal(), query.qr_code_id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn logs(
    State(webhook_outbox_usecase): State<Arc<WebhookOutboxUseCase>>,
    auth: ApiKeyAuth<WebhookRead>,
    ApiPath(qr_code_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<WebhookLogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = webhook_outbox_usecase
        .list_logs(auth.principal(), qr_code_id, query)
        .await?;
    Ok(Json(page))
}

pub async fn retry(
    State(webhook_outbox_usecase): State<Arc<WebhookOutboxUseCase>>,
    auth: ApiKeyAuth<WebhookWrite>,
    ApiPath(qr_code_id): ApiPath<Uuid>,
    ApiJson(model): ApiJson<RetryWebhookModel>,
) -> Result<impl IntoResponse, ApiError> {
    let log = webhook_outbox_usecase
        .retry(auth.principal(), qr_code_id, model.log_id)
        .await?;
    Ok(Json(json!({ "success": log.is_successful, "log": log })))
}
