use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::value_objects::qr_codes::{CreateQrCodeModel, PageQuery, UpdateQrCodeModel};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::ApiError,
        extractors::{ApiJson, ApiPath, ApiQuery},
    },
    usecases::qr_codes::QrCodesUseCase,
};

pub fn routes(qr_codes_usecase: Arc<QrCodesUseCase>) -> Router {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_one).patch(update).delete(remove))
        .with_state(qr_codes_usecase)
}

pub async fn create(
    State(qr_codes_usecase): State<Arc<QrCodesUseCase>>,
    auth: AuthUser,
    ApiJson(model): ApiJson<CreateQrCodeModel>,
) -> Result<impl IntoResponse, ApiError> {
    let qr_code = qr_codes_usecase.create(auth.user_id, model).await?;
    Ok((StatusCode::CREATED, Json(qr_code)))
}

pub async fn list(
    State(qr_codes_usecase): State<Arc<QrCodesUseCase>>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = qr_codes_usecase.list(auth.user_id, query).await?;
    Ok(Json(page))
}

pub async fn get_one(
    State(qr_codes_usecase): State<Arc<QrCodesUseCase>>,
    auth: AuthUser,
    ApiPath(qr_code_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let qr_code = qr_codes_usecase.get(auth.user_id, qr_code_id).await?;
    Ok(Json(qr_code))
}

pub async fn update(
    State(qr_codes_usecase): State<Arc<QrCodesUseCase>>,
    auth: AuthUser,
    ApiPath(qr_code_id): ApiPath<Uuid>,
    ApiJson(model): ApiJson<UpdateQrCodeModel>,
) -> Result<impl IntoResponse, ApiError> {
    let qr_code = qr_codes_usecase.update(auth.user_id, qr_code_id, model).await?;
    Ok(Json(qr_code))
}

pub async fn remove(
    State(qr_codes_usecase): State<Arc<QrCodesUseCase>>,
    auth: AuthUser,
    ApiPath(qr_code_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    qr_codes_usecase.delete(auth.user_id, qr_code_id).await?;
    Ok(Json(json!({ "success": true })))
}
