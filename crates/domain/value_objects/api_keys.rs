use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{entities::api_keys::ApiKeyEntity, value_objects::validation::FieldError};

pub const API_KEY_PREFIX: &str = "sk_";
pub const KEY_PREFIX_LENGTH: usize = 12;
pub const WILDCARD_SCOPE: &str = "*";

pub const SCOPE_QR_READ: &str = "qr:read";
pub const SCOPE_QR_WRITE: &str = "qr:write";
pub const SCOPE_WEBHOOK_READ: &str = "webhook:read";
pub const SCOPE_WEBHOOK_WRITE: &str = "webhook:write";
pub const SCOPE_ANALYTICS_READ: &str = "analytics:read";

pub const KNOWN_SCOPES: [&str; 6] = [
    SCOPE_QR_READ,
    SCOPE_QR_WRITE,
    SCOPE_WEBHOOK_READ,
    SCOPE_WEBHOOK_WRITE,
    SCOPE_ANALYTICS_READ,
    WILDCARD_SCOPE,
];

pub fn has_scope(scopes: &[String], required: &str) -> bool {
    scopes
        .iter()
        .any(|scope| scope == WILDCARD_SCOPE || scope == required)
}

/// Identity resolved from a verified API key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyPrincipal {
    pub key_id: Uuid,
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub scopes: Vec<String>,
}

impl From<&ApiKeyEntity> for ApiKeyPrincipal {
    fn from(entity: &ApiKeyEntity) -> Self {
        Self {
            key_id: entity.id,
            user_id: entity.user_id,
            organization_id: entity.organization_id,
            scopes: entity.scopes.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateApiKeyModel {
    pub name: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub organization_id: Option<Uuid>,
    pub expires_in_days: Option<i64>,
}

impl CreateApiKeyModel {
    pub fn validate(&self) -> Result<(), FieldError> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(FieldError::missing("name"));
        }
        if name.chars().count() > 100 {
            return Err(FieldError::out_of_range(
                "name",
                "name must be at most 100 characters",
            ));
        }
        if self.scopes.is_empty() {
            return Err(FieldError::missing("scopes"));
        }
        if let Some(unknown) = self
            .scopes
            .iter()
            .find(|scope| !KNOWN_SCOPES.contains(&scope.as_str()))
        {
            return Err(FieldError::invalid_format(
                "scopes",
                format!("unknown scope '{unknown}'"),
            ));
        }
        if self.expires_in_days.is_some_and(|days| !(1..=3650).contains(&days)) {
            return Err(FieldError::out_of_range(
                "expiresInDays",
                "expiresInDays must be between 1 and 3650",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyDto {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub scopes: Vec<String>,
    pub organization_id: Option<Uuid>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKeyEntity> for ApiKeyDto {
    fn from(entity: ApiKeyEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            key_prefix: format!("{}...", entity.key_prefix),
            scopes: entity.scopes,
            organization_id: entity.organization_id,
            is_active: entity.is_active,
            expires_at: entity.expires_at,
            last_used_at: entity.last_used_at,
            created_at: entity.created_at,
        }
    }
}

/// Returned exactly once, when the key is minted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApiKeyDto {
    #[serde(flatten)]
    pub api_key: ApiKeyDto,
    pub key: String,
}
