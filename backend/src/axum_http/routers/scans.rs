use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header::USER_AGENT},
    response::IntoResponse,
    routing::post,
};
use crates::domain::value_objects::scans::ScanContext;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{error_responses::ApiError, extractors::ApiPath},
    usecases::scans::ScansUseCase,
};

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const COUNTRY_HEADERS: [&str; 2] = ["x-vercel-ip-country", "cf-ipcountry"];
const CITY_HEADER: &str = "x-vercel-ip-city";

pub fn routes(scans_usecase: Arc<ScansUseCase>) -> Router {
    Router::new()
        .route("/:id/scan", post(record).get(analytics))
        .with_state(scans_usecase)
}

/// Public endpoint hit by the redirect page.
pub async fn record(
    State(scans_usecase): State<Arc<ScansUseCase>>,
    ApiPath(qr_code_id): ApiPath<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let result = scans_usecase.record(qr_code_id, scan_context(&headers)).await?;
    Ok(Json(result))
}

pub async fn analytics(
    State(scans_usecase): State<Arc<ScansUseCase>>,
    auth: AuthUser,
    ApiPath(qr_code_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let analytics = scans_usecase.analytics(auth.user_id, qr_code_id).await?;
    Ok(Json(analytics))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn scan_context(headers: &HeaderMap) -> ScanContext {
    // First hop of x-forwarded-for is the client.
    let ip_address = header(headers, FORWARDED_FOR)
        .and_then(|value| value.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header(headers, REAL_IP));

    ScanContext {
        user_agent: header(headers, USER_AGENT.as_str()),
        ip_address,
        country: COUNTRY_HEADERS.iter().find_map(|name| header(headers, name)),
        city: header(headers, CITY_HEADER),
    }
}
