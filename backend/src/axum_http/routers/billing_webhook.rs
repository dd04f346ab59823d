use std::sync::Arc;

use axum::{Json, Router, body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, routing::post};
use crates::payments::razorpay_client::SIGNATURE_HEADER;

use crate::{axum_http::error_responses::ApiError, usecases::billing_webhook::BillingWebhookUseCase};

pub fn routes(billing_webhook_usecase: Arc<BillingWebhookUseCase>) -> Router {
    Router::new()
        .route("/webhook", post(receive))
        .with_state(billing_webhook_usecase)
}

/// The signature covers the exact body bytes, so the body is taken raw.
pub async fn receive(
    State(billing_webhook_usecase): State<Arc<BillingWebhookUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let ack = billing_webhook_usecase.handle(&body, signature).await?;
    Ok(Json(ack))
}
