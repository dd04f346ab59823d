use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::{credits::CreditsUseCase, entitlements::EntitlementsUseCase},
};

#[derive(Clone)]
pub struct UserState {
    pub credits: Arc<CreditsUseCase>,
    pub entitlements: Arc<EntitlementsUseCase>,
}

pub fn routes(state: UserState) -> Router {
    Router::new()
        .route("/credits", get(credits))
        .route("/entitlements", get(entitlements))
        .with_state(state)
}

pub async fn credits(
    State(state): State<UserState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let balance = state.credits.balance(auth.user_id).await?;
    Ok(Json(balance))
}

pub async fn entitlements(
    State(state): State<UserState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let entitlements = state.entitlements.entitlements(auth.user_id).await?;
    Ok(Json(entitlements))
}
