use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::bulk_groups::{BulkGroupEntity, InsertBulkGroupEntity},
    value_objects::enums::bulk_group_statuses::BulkGroupStatus,
};

#[automock]
#[async_trait]
pub trait BulkGroupRepository {
    async fn create(&self, bulk_group: InsertBulkGroupEntity) -> Result<BulkGroupEntity>;
    async fn finish(
        &self,
        bulk_group_id: Uuid,
        status: BulkGroupStatus,
        processed_count: i32,
        failed_count: i32,
        results: serde_json::Value,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn find_for_user(&self, bulk_group_id: Uuid, user_id: Uuid) -> Result<Option<BulkGroupEntity>>;
    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<BulkGroupEntity>>;
}
