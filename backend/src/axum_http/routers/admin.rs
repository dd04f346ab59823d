use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use crates::domain::value_objects::credits::AdjustCreditsModel;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    axum_http::{
        error_responses::ApiError,
        extractors::{ApiJson, ApiPath},
    },
    usecases::credits::CreditsUseCase,
};

pub fn routes(credits_usecase: Arc<CreditsUseCase>) -> Router {
    Router::new()
        .route("/users/:id/credits", post(adjust_credits))
        .with_state(credits_usecase)
}

pub async fn adjust_credits(
    State(credits_usecase): State<Arc<CreditsUseCase>>,
    admin: AdminUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(model): ApiJson<AdjustCreditsModel>,
) -> Result<impl IntoResponse, ApiError> {
    let delta = model.validate()?;
    let balance = credits_usecase
        .adjust(admin.0.user_id, user_id, delta, model.reason.as_deref())
        .await?;
    Ok(Json(balance))
}
