use std::{marker::PhantomData, sync::Arc};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use crates::domain::value_objects::{
    api_keys::{
        ApiKeyPrincipal, SCOPE_ANALYTICS_READ, SCOPE_QR_READ, SCOPE_QR_WRITE, SCOPE_WEBHOOK_READ,
        SCOPE_WEBHOOK_WRITE,
    },
    rate_limits::RateLimitPolicy,
};

use super::bearer_token;
use crate::{
    axum_http::error_responses::ApiError,
    usecases::{api_keys::ApiKeyUseCase, rate_limiter::RateLimiter},
};

/// Scope an `ApiKeyAuth` extractor demands.
pub trait RequiredScope: Send + Sync + 'static {
    const SCOPE: &'static str;
}

pub struct QrRead;
pub struct QrWrite;
pub struct WebhookRead;
pub struct WebhookWrite;
pub struct AnalyticsRead;

impl RequiredScope for QrRead {
    const SCOPE: &'static str = SCOPE_QR_READ;
}

impl RequiredScope for QrWrite {
    const SCOPE: &'static str = SCOPE_QR_WRITE;
}

impl RequiredScope for WebhookRead {
    const SCOPE: &'static str = SCOPE_WEBHOOK_READ;
}

impl RequiredScope for WebhookWrite {
    const SCOPE: &'static str = SCOPE_WEBHOOK_WRITE;
}

impl RequiredScope for AnalyticsRead {
    const SCOPE: &'static str = SCOPE_ANALYTICS_READ;
}

/// `Authorization: Bearer sk_...` caller, verified, scope-checked and rate limited.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth<S: RequiredScope> {
    pub principal: ApiKeyPrincipal,
    _scope: PhantomData<S>,
}

impl<S: RequiredScope> ApiKeyAuth<S> {
    pub fn principal(&self) -> &ApiKeyPrincipal {
        &self.principal
    }
}

#[async_trait]
impl<St, S> FromRequestParts<St> for ApiKeyAuth<S>
where
    St: Send + Sync,
    S: RequiredScope,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let api_keys = parts
            .extensions
            .get::<Arc<ApiKeyUseCase>>()
            .cloned()
            .ok_or_else(|| ApiError::internal(anyhow::anyhow!("api key service not installed")))?;
        let rate_limiter = parts
            .extensions
            .get::<Arc<RateLimiter>>()
            .cloned()
            .ok_or_else(|| ApiError::internal(anyhow::anyhow!("rate limiter not installed")))?;

        let raw_key = bearer_token(&parts.headers)?;
        let principal = api_keys.authenticate(raw_key, S::SCOPE).await?;

        rate_limiter
            .enforce(&format!("apikey:{}", principal.key_id), &RateLimitPolicy::api_v1())
            .await?;

        Ok(Self {
            principal,
            _scope: PhantomData,
        })
    }
}
