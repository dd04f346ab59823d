use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::domain::value_objects::bulk::{BulkGroupQuery, BulkOperationModel};
use serde_json::json;

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::ApiError,
        extractors::{ApiJson, ApiQuery},
    },
    usecases::bulk::BulkUseCase,
};

pub fn routes(bulk_usecase: Arc<BulkUseCase>) -> Router {
    Router::new()
        .route("/bulk", post(run).get(groups))
        .with_state(bulk_usecase)
}

pub async fn run(
    State(bulk_usecase): State<Arc<BulkUseCase>>,
    auth: AuthUser,
    ApiJson(model): ApiJson<BulkOperationModel>,
) -> Result<impl IntoResponse, ApiError> {
    let result = bulk_usecase.run(auth.user_id, model).await?;
    Ok(Json(result))
}

/// One group when `bulkGroupId` is given, otherwise the recent history.
pub async fn groups(
    State(bulk_usecase): State<Arc<BulkUseCase>>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<BulkGroupQuery>,
) -> Result<Response, ApiError> {
    match query.bulk_group_id {
        Some(bulk_group_id) => {
            let group = bulk_usecase.get_group(auth.user_id, bulk_group_id).await?;
            Ok(Json(json!({ "bulkGroup": group })).into_response())
        }
        None => {
            let groups = bulk_usecase.list_groups(auth.user_id).await?;
            Ok(Json(json!({ "bulkGroups": groups })).into_response())
        }
    }
}
