use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::api_keys::{ApiKeyEntity, InsertApiKeyEntity};

#[automock]
#[async_trait]
pub trait ApiKeyRepository {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyEntity>>;
    async fn touch_last_used(&self, api_key_id: Uuid, used_at: DateTime<Utc>) -> Result<()>;
    async fn create(&self, api_key: InsertApiKeyEntity) -> Result<ApiKeyEntity>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKeyEntity>>;
    /// Deactivates the key if `user_id` owns it and returns the revoked row.
    async fn revoke(&self, api_key_id: Uuid, user_id: Uuid) -> Result<Option<ApiKeyEntity>>;
}
