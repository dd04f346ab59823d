use axum::{
    Json,
    extract::{Request, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_LENGTH, RETRY_AFTER},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use crates::domain::value_objects::{
    credits::CreditTransactionError,
    plans::minimum_plan_for,
    validation::{FieldError, FieldErrorKind},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    config::stage::Stage,
    usecases::{
        api_keys::ApiKeyError, billing_webhook::BillingWebhookError, bulk::BulkError,
        credits::CreditError, entitlements::EntitlementError, qr_codes::QrCodeError,
        rate_limiter::RateLimitError, scans::ScanError, webhook_outbox::WebhookError,
    },
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred";
const GENERIC_DATABASE_MESSAGE: &str = "Database operation failed";

/// Every error code the API can answer with. Each maps to exactly one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    Unauthorized,
    InvalidApiKey,
    Forbidden,
    InsufficientScope,
    InvalidSignature,
    NotFound,
    UserNotFound,
    QrCodeNotFound,
    ValidationError,
    InvalidInput,
    MissingRequiredField,
    InvalidFormat,
    #[serde(rename = "no_credits")]
    InsufficientCredits,
    PaymentRequired,
    PlanLimit,
    FeatureNotAllowed,
    QuotaExceeded,
    RateLimited,
    AlreadyExists,
    Conflict,
    InternalError,
    DatabaseError,
    ExternalServiceError,
    Timeout,
}

impl ApiErrorCode {
    pub const ALL: [ApiErrorCode; 24] = [
        ApiErrorCode::Unauthorized,
        ApiErrorCode::InvalidApiKey,
        ApiErrorCode::Forbidden,
        ApiErrorCode::InsufficientScope,
        ApiErrorCode::InvalidSignature,
        ApiErrorCode::NotFound,
        ApiErrorCode::UserNotFound,
        ApiErrorCode::QrCodeNotFound,
        ApiErrorCode::ValidationError,
        ApiErrorCode::InvalidInput,
        ApiErrorCode::MissingRequiredField,
        ApiErrorCode::InvalidFormat,
        ApiErrorCode::InsufficientCredits,
        ApiErrorCode::PaymentRequired,
        ApiErrorCode::PlanLimit,
        ApiErrorCode::FeatureNotAllowed,
        ApiErrorCode::QuotaExceeded,
        ApiErrorCode::RateLimited,
        ApiErrorCode::AlreadyExists,
        ApiErrorCode::Conflict,
        ApiErrorCode::InternalError,
        ApiErrorCode::DatabaseError,
        ApiErrorCode::ExternalServiceError,
        ApiErrorCode::Timeout,
    ];

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::Unauthorized | ApiErrorCode::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden
            | ApiErrorCode::InsufficientScope
            | ApiErrorCode::InvalidSignature
            | ApiErrorCode::PlanLimit
            | ApiErrorCode::FeatureNotAllowed
            | ApiErrorCode::QuotaExceeded => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound | ApiErrorCode::UserNotFound | ApiErrorCode::QrCodeNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiErrorCode::ValidationError
            | ApiErrorCode::InvalidInput
            | ApiErrorCode::MissingRequiredField
            | ApiErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,
            ApiErrorCode::InsufficientCredits | ApiErrorCode::PaymentRequired => {
                StatusCode::PAYMENT_REQUIRED
            }
            ApiErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::AlreadyExists | ApiErrorCode::Conflict => StatusCode::CONFLICT,
            ApiErrorCode::InternalError | ApiErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiErrorCode::ExternalServiceError | ApiErrorCode::Timeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Non-operational errors are bugs or outages; their detail stays server-side in production.
    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiErrorCode::InternalError | ApiErrorCode::DatabaseError)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub field: Option<String>,
    pub retry_after: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: ApiErrorCode,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            field: None,
            retry_after: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Unauthorized, message)
    }

    pub fn invalid_api_key() -> Self {
        Self::new(ApiErrorCode::InvalidApiKey, "Invalid or expired API key")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Forbidden, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ApiErrorCode::NotFound, format!("{resource} not found"))
    }

    pub fn qr_code_not_found(qr_code_id: impl std::fmt::Display) -> Self {
        Self::new(
            ApiErrorCode::QrCodeNotFound,
            format!("QR code '{qr_code_id}' not found"),
        )
    }

    pub fn user_not_found(user_id: impl std::fmt::Display) -> Self {
        Self::new(ApiErrorCode::UserNotFound, format!("User '{user_id}' not found"))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidInput, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ValidationError, message)
    }

    pub fn insufficient_credits(required: i32, available: i32) -> Self {
        Self::new(
            ApiErrorCode::InsufficientCredits,
            format!("Insufficient credits. Required: {required}, Available: {available}"),
        )
        .with_details(json!({ "required": required, "available": available }))
    }

    pub fn rate_limited(retry_after: i64) -> Self {
        let mut err = Self::new(
            ApiErrorCode::RateLimited,
            format!("Rate limit exceeded. Please try again in {retry_after} seconds"),
        )
        .with_details(json!({ "retryAfter": retry_after }));
        err.retry_after = Some(retry_after);
        err
    }

    pub fn external_service(service: &str) -> Self {
        Self::new(
            ApiErrorCode::ExternalServiceError,
            format!("External service '{service}' is unavailable"),
        )
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::new(ApiErrorCode::InternalError, format!("{err:#}"))
    }

    pub fn database(err: anyhow::Error) -> Self {
        Self::new(ApiErrorCode::DatabaseError, format!("{err:#}"))
    }

    pub fn to_response_body(&self, stage: Stage, correlation_id: Option<String>) -> ErrorResponse {
        let hide_internals = !self.code.is_operational() && !stage.exposes_internal_errors();
        let message = match (hide_internals, self.code) {
            (true, ApiErrorCode::DatabaseError) => GENERIC_DATABASE_MESSAGE.to_string(),
            (true, _) => GENERIC_INTERNAL_MESSAGE.to_string(),
            (false, _) => self.message.clone(),
        };

        ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message,
                timestamp: Utc::now(),
                details: if hide_internals { None } else { self.details.clone() },
                field: self.field.clone(),
                correlation_id,
            },
            retry_after: self.retry_after,
        }
    }
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        let code = match err.kind {
            FieldErrorKind::Missing => ApiErrorCode::MissingRequiredField,
            FieldErrorKind::InvalidFormat => ApiErrorCode::InvalidFormat,
            FieldErrorKind::OutOfRange => ApiErrorCode::ValidationError,
        };
        ApiError::new(code, err.message).with_field(err.field)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.code.is_operational() {
            debug!(code = ?self.code, status = status.as_u16(), message = %self.message, "api_error: operational");
        } else {
            error!(code = ?self.code, status = status.as_u16(), message = %self.message, "api_error: non-operational");
        }

        // Rendered as if in production until `render_api_errors` sees the request context.
        let body = self.to_response_body(Stage::Production, None);
        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response.extensions_mut().insert(self);
        response
    }
}

/// Re-renders `ApiError` responses with the stage policy and the request's correlation id.
pub async fn render_api_errors(State(stage): State<Stage>, request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;
    let Some(api_error) = response.extensions_mut().remove::<ApiError>() else {
        return response;
    };

    let body = api_error.to_response_body(stage, correlation_id);
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    (parts, Json(body)).into_response()
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Limited { retry_after } => ApiError::rate_limited(retry_after),
            RateLimitError::Unavailable(source) => {
                warn!(error = ?source, "api_error: rate limit store unavailable");
                ApiError::external_service("rate_limiter")
            }
        }
    }
}

impl From<EntitlementError> for ApiError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::UserNotFound(user_id) => ApiError::user_not_found(user_id),
            EntitlementError::QrLimit { plan, limit, current } => ApiError::new(
                ApiErrorCode::PlanLimit,
                format!(
                    "QR code limit reached for your plan ({limit}). Upgrade to create more QR codes."
                ),
            )
            .with_details(json!({ "limit": limit, "current": current, "plan": plan })),
            EntitlementError::ScanQuota { plan, limit, current } => ApiError::new(
                ApiErrorCode::PlanLimit,
                format!("Monthly scan limit reached for this plan ({limit})."),
            )
            .with_details(json!({ "limit": limit, "current": current, "plan": plan })),
            EntitlementError::FeatureNotAllowed { feature, plan } => {
                let required_plan = minimum_plan_for(feature);
                ApiError::new(
                    ApiErrorCode::FeatureNotAllowed,
                    format!("Feature '{}' requires {required_plan} plan", feature.as_str()),
                )
                .with_details(json!({
                    "feature": feature,
                    "plan": plan,
                    "requiredPlan": required_plan,
                }))
            }
            EntitlementError::Internal(source) => ApiError::database(source),
        }
    }
}

impl From<CreditTransactionError> for ApiError {
    fn from(err: CreditTransactionError) -> Self {
        match err {
            CreditTransactionError::InsufficientCredits { required, available } => {
                ApiError::insufficient_credits(required, available)
            }
            CreditTransactionError::UserNotFound => {
                ApiError::new(ApiErrorCode::UserNotFound, "User not found")
            }
            CreditTransactionError::TransactionFailed(source) => ApiError::database(source),
        }
    }
}

impl From<QrCodeError> for ApiError {
    fn from(err: QrCodeError) -> Self {
        match err {
            QrCodeError::Validation(field_error) => field_error.into(),
            QrCodeError::NotFound(qr_code_id) => ApiError::qr_code_not_found(qr_code_id),
            QrCodeError::Forbidden(message) => ApiError::forbidden(message),
            QrCodeError::Entitlement(inner) => inner.into(),
            QrCodeError::Credits(inner) => inner.into(),
            QrCodeError::RateLimit(inner) => inner.into(),
            QrCodeError::Internal(source) => ApiError::database(source),
        }
    }
}

impl From<CreditError> for ApiError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::UserNotFound(user_id) => ApiError::user_not_found(user_id),
            CreditError::InvalidDelta => {
                ApiError::validation("delta must be a non-zero integer").with_field("delta")
            }
            CreditError::WouldGoNegative { balance, delta } => ApiError::validation(format!(
                "Adjustment would make the balance negative (balance {balance}, delta {delta})"
            ))
            .with_field("delta")
            .with_details(json!({ "balance": balance, "delta": delta })),
            CreditError::Internal(source) => ApiError::database(source),
        }
    }
}

impl From<BulkError> for ApiError {
    fn from(err: BulkError) -> Self {
        match err {
            BulkError::Validation(field_error) => field_error.into(),
            BulkError::GroupNotFound(_) => ApiError::not_found("Bulk group"),
            BulkError::Entitlement(inner) => inner.into(),
            BulkError::Credits(inner) => inner.into(),
            BulkError::RateLimit(inner) => inner.into(),
            BulkError::Internal(source) => ApiError::database(source),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::QrCodeNotFound(qr_code_id) => ApiError::qr_code_not_found(qr_code_id),
            ScanError::Inactive => ApiError::forbidden("QR code is inactive"),
            ScanError::Expired => ApiError::forbidden("QR code has expired"),
            ScanError::LimitReached => ApiError::forbidden("QR code scan limit reached"),
            ScanError::Forbidden => {
                ApiError::forbidden("You do not have access to this QR code's analytics")
            }
            ScanError::RateLimit(inner) => inner.into(),
            ScanError::Entitlement(inner) => inner.into(),
            ScanError::Internal(source) => ApiError::database(source),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Validation(field_error) => field_error.into(),
            WebhookError::QrCodeNotFound(qr_code_id) => ApiError::qr_code_not_found(qr_code_id),
            WebhookError::LogNotFound(_) => ApiError::not_found("Webhook log"),
            WebhookError::Forbidden => {
                ApiError::forbidden("You do not have access to this QR code")
            }
            WebhookError::NotConfigured(_) => {
                ApiError::new(ApiErrorCode::Conflict, "QR code has no webhook configured")
            }
            WebhookError::Entitlement(inner) => inner.into(),
            WebhookError::Internal(source) => ApiError::database(source),
        }
    }
}

impl From<BillingWebhookError> for ApiError {
    fn from(err: BillingWebhookError) -> Self {
        match err {
            BillingWebhookError::NotConfigured => ApiError::external_service("razorpay"),
            BillingWebhookError::InvalidSignature => {
                ApiError::new(ApiErrorCode::InvalidSignature, "Invalid webhook signature")
            }
            BillingWebhookError::InvalidPayload(message) => ApiError::invalid_input(message),
            BillingWebhookError::Processing(source) => ApiError::internal(source),
        }
    }
}

impl From<ApiKeyError> for ApiError {
    fn from(err: ApiKeyError) -> Self {
        match err {
            ApiKeyError::Validation(field_error) => field_error.into(),
            ApiKeyError::InvalidKey => ApiError::invalid_api_key(),
            ApiKeyError::InsufficientScope(scope) => ApiError::new(
                ApiErrorCode::InsufficientScope,
                format!("API key is missing the '{scope}' scope"),
            )
            .with_details(json!({ "requiredScope": scope })),
            ApiKeyError::NotFound(_) => ApiError::not_found("API key"),
            ApiKeyError::Forbidden(message) => ApiError::forbidden(message),
            ApiKeyError::RateLimit(inner) => inner.into(),
            ApiKeyError::Internal(source) => ApiError::database(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_code_maps_to_one_status() {
        let codes: HashSet<_> = ApiErrorCode::ALL.iter().collect();
        assert_eq!(codes.len(), ApiErrorCode::ALL.len());

        assert_eq!(ApiErrorCode::InsufficientCredits.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(ApiErrorCode::PlanLimit.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiErrorCode::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiErrorCode::Timeout.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiErrorCode::InvalidApiKey.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn codes_serialize_to_wire_names() {
        assert_eq!(
            serde_json::to_value(ApiErrorCode::InsufficientCredits).unwrap(),
            json!("no_credits")
        );
        assert_eq!(
            serde_json::to_value(ApiErrorCode::ExternalServiceError).unwrap(),
            json!("external_service_error")
        );
    }

    #[test]
    fn production_hides_non_operational_details() {
        let err = ApiError::database(anyhow::anyhow!("relation \"users\" does not exist"))
            .with_details(json!({ "query": "select" }));

        let prod = err.to_response_body(Stage::Production, Some("req-1".to_string()));
        assert_eq!(prod.error.message, GENERIC_DATABASE_MESSAGE);
        assert!(prod.error.details.is_none());
        assert_eq!(prod.error.correlation_id.as_deref(), Some("req-1"));

        let dev = err.to_response_body(Stage::Development, None);
        assert!(dev.error.message.contains("does not exist"));
        assert!(dev.error.details.is_some());
    }

    #[test]
    fn operational_errors_keep_details_in_production() {
        let err = ApiError::insufficient_credits(1, 0);
        let body = err.to_response_body(Stage::Production, None);
        assert_eq!(body.error.details, Some(json!({ "required": 1, "available": 0 })));
    }

    #[test]
    fn rate_limited_body_carries_retry_after_twice() {
        let body = serde_json::to_value(
            ApiError::rate_limited(42).to_response_body(Stage::Production, None),
        )
        .unwrap();
        assert_eq!(body["retryAfter"], json!(42));
        assert_eq!(body["error"]["details"]["retryAfter"], json!(42));
        assert_eq!(body["error"]["code"], json!("rate_limited"));
    }

    #[test]
    fn field_errors_map_by_kind() {
        let missing: ApiError = FieldError::missing("url").into();
        assert_eq!(missing.code, ApiErrorCode::MissingRequiredField);
        assert_eq!(missing.field.as_deref(), Some("url"));

        let format: ApiError = FieldError::invalid_format("url", "bad").into();
        assert_eq!(format.code, ApiErrorCode::InvalidFormat);
    }

    #[test]
    fn insufficient_credit_transaction_maps_to_no_credits() {
        let err: ApiError = CreditTransactionError::InsufficientCredits {
            required: 3,
            available: 2,
        }
        .into();
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.details, Some(json!({ "required": 3, "available": 2 })));
    }

    #[tokio::test]
    async fn into_response_sets_retry_after_header() {
        let response = ApiError::rate_limited(7).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "7");
        assert!(response.extensions().get::<ApiError>().is_some());
    }
}
