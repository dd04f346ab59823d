use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::qr_code_bulk_groups},
};
use domain::{
    entities::bulk_groups::{BulkGroupEntity, InsertBulkGroupEntity},
    repositories::bulk_groups::BulkGroupRepository,
    value_objects::enums::bulk_group_statuses::BulkGroupStatus,
};

pub struct BulkGroupPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BulkGroupPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BulkGroupRepository for BulkGroupPostgres {
    async fn create(&self, bulk_group: InsertBulkGroupEntity) -> Result<BulkGroupEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = insert_into(qr_code_bulk_groups::table)
            .values(&bulk_group)
            .returning(BulkGroupEntity::as_returning())
            .get_result::<BulkGroupEntity>(&mut conn)?;

        Ok(created)
    }

    async fn finish(
        &self,
        bulk_group_id: Uuid,
        status: BulkGroupStatus,
        processed_count: i32,
        failed_count: i32,
        results: serde_json::Value,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(qr_code_bulk_groups::table.find(bulk_group_id))
            .set((
                qr_code_bulk_groups::status.eq(status.to_string()),
                qr_code_bulk_groups::processed_count.eq(processed_count),
                qr_code_bulk_groups::failed_count.eq(failed_count),
                qr_code_bulk_groups::results.eq(Some(results)),
                qr_code_bulk_groups::completed_at.eq(Some(completed_at)),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_for_user(&self, bulk_group_id: Uuid, user_id: Uuid) -> Result<Option<BulkGroupEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let bulk_group = qr_code_bulk_groups::table
            .filter(qr_code_bulk_groups::id.eq(bulk_group_id))
            .filter(qr_code_bulk_groups::user_id.eq(user_id))
            .select(BulkGroupEntity::as_select())
            .first::<BulkGroupEntity>(&mut conn)
            .optional()?;

        Ok(bulk_group)
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<BulkGroupEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = qr_code_bulk_groups::table
            .filter(qr_code_bulk_groups::user_id.eq(user_id))
            .order(qr_code_bulk_groups::created_at.desc())
            .limit(limit)
            .select(BulkGroupEntity::as_select())
            .load::<BulkGroupEntity>(&mut conn)?;

        Ok(results)
    }
}
