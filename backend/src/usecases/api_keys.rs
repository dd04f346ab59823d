use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::{
    domain::{
        entities::api_keys::{ApiKeyEntity, InsertApiKeyEntity},
        repositories::{api_keys::ApiKeyRepository, cache::CacheStore},
        value_objects::{
            api_keys::{ApiKeyDto, ApiKeyPrincipal, CreateApiKeyModel, CreatedApiKeyDto, has_scope},
            rate_limits::RateLimitPolicy,
            validation::FieldError,
        },
    },
    infra::{
        cache::{keys, typed},
        security::api_key_hasher::{generate_api_key, hash_api_key, looks_like_api_key},
    },
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    access::AccessPolicy,
    rate_limiter::{RateLimitError, RateLimiter},
};

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error(transparent)]
    Validation(FieldError),
    #[error("invalid or expired API key")]
    InvalidKey,
    #[error("API key is missing the '{0}' scope")]
    InsufficientScope(String),
    #[error("API key {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<FieldError> for ApiKeyError {
    fn from(err: FieldError) -> Self {
        ApiKeyError::Validation(err)
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ApiKeyError>;

pub struct ApiKeyUseCase {
    api_key_repository: Arc<dyn ApiKeyRepository + Send + Sync>,
    access: Arc<AccessPolicy>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<dyn CacheStore>,
}

impl ApiKeyUseCase {
    pub fn new(
        api_key_repository: Arc<dyn ApiKeyRepository + Send + Sync>,
        access: Arc<AccessPolicy>,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            api_key_repository,
            access,
            rate_limiter,
            cache,
        }
    }

    /// Mints a key. The raw value is only ever returned here.
    pub async fn create(&self, user_id: Uuid, model: CreateApiKeyModel) -> UseCaseResult<CreatedApiKeyDto> {
        model.validate()?;
        self.rate_limiter
            .enforce(&format!("apikey_create:{user_id}"), &RateLimitPolicy::api_key_create())
            .await?;

        if let Some(organization_id) = model.organization_id {
            if !self.access.can_manage_organization(organization_id, user_id).await? {
                return Err(ApiKeyError::Forbidden(
                    "Only organization owners and admins can create organization keys".to_string(),
                ));
            }
        }

        let generated = generate_api_key();
        let created = self
            .api_key_repository
            .create(InsertApiKeyEntity {
                user_id: Some(user_id),
                organization_id: model.organization_id,
                name: model.name.as_deref().map(str::trim).unwrap_or_default().to_string(),
                key_prefix: generated.key_prefix,
                key_hash: generated.key_hash,
                scopes: model.scopes,
                expires_at: model.expires_in_days.map(|days| Utc::now() + Duration::days(days)),
            })
            .await?;

        info!(%user_id, api_key_id = %created.id, scopes = ?created.scopes, "api_keys: created");
        Ok(CreatedApiKeyDto {
            api_key: created.into(),
            key: generated.raw_key,
        })
    }

    pub async fn list(&self, user_id: Uuid) -> UseCaseResult<Vec<ApiKeyDto>> {
        let keys = self.api_key_repository.list_for_user(user_id).await?;
        Ok(keys.into_iter().map(ApiKeyDto::from).collect())
    }

    pub async fn revoke(&self, user_id: Uuid, api_key_id: Uuid) -> UseCaseResult<()> {
        let revoked = self
            .api_key_repository
            .revoke(api_key_id, user_id)
            .await?
            .ok_or(ApiKeyError::NotFound(api_key_id))?;

        typed::invalidate(self.cache.as_ref(), &[keys::api_key(&revoked.key_hash)]).await;
        info!(%user_id, %api_key_id, "api_keys: revoked");
        Ok(())
    }

    /// Resolves a raw `sk_` key into the principal it acts for.
    pub async fn authenticate(&self, raw_key: &str, required_scope: &str) -> UseCaseResult<ApiKeyPrincipal> {
        if !looks_like_api_key(raw_key) {
            return Err(ApiKeyError::InvalidKey);
        }

        let key_hash = hash_api_key(raw_key);
        let entity = match typed::get_json::<ApiKeyEntity>(self.cache.as_ref(), &keys::api_key(&key_hash)).await {
            Some(cached) => cached,
            None => {
                let entity = self
                    .api_key_repository
                    .find_by_hash(&key_hash)
                    .await?
                    .ok_or(ApiKeyError::InvalidKey)?;
                typed::set_json(self.cache.as_ref(), &keys::api_key(&key_hash), &entity, keys::API_KEY_TTL).await;
                entity
            }
        };

        let now = Utc::now();
        if !entity.is_usable_at(now) {
            return Err(ApiKeyError::InvalidKey);
        }
        if !has_scope(&entity.scopes, required_scope) {
            return Err(ApiKeyError::InsufficientScope(required_scope.to_string()));
        }

        if let Err(err) = self.api_key_repository.touch_last_used(entity.id, now).await {
            warn!(api_key_id = %entity.id, error = ?err, "api_keys: failed to update last_used_at");
        }

        Ok(ApiKeyPrincipal::from(&entity))
    }
}
