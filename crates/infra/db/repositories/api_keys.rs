use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::api_keys},
};
use domain::{
    entities::api_keys::{ApiKeyEntity, InsertApiKeyEntity},
    repositories::api_keys::ApiKeyRepository,
};

pub struct ApiKeyPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ApiKeyPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ApiKeyRepository for ApiKeyPostgres {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let api_key = api_keys::table
            .filter(api_keys::key_hash.eq(key_hash))
            .select(ApiKeyEntity::as_select())
            .first::<ApiKeyEntity>(&mut conn)
            .optional()?;

        Ok(api_key)
    }

    async fn touch_last_used(&self, api_key_id: Uuid, used_at: DateTime<Utc>) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(api_keys::table.find(api_key_id))
            .set(api_keys::last_used_at.eq(Some(used_at)))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn create(&self, api_key: InsertApiKeyEntity) -> Result<ApiKeyEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = insert_into(api_keys::table)
            .values(&api_key)
            .returning(ApiKeyEntity::as_returning())
            .get_result::<ApiKeyEntity>(&mut conn)?;

        Ok(created)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApiKeyEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = api_keys::table
            .filter(api_keys::user_id.eq(user_id))
            .order(api_keys::created_at.desc())
            .select(ApiKeyEntity::as_select())
            .load::<ApiKeyEntity>(&mut conn)?;

        Ok(results)
    }

    async fn revoke(&self, api_key_id: Uuid, user_id: Uuid) -> Result<Option<ApiKeyEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let revoked = update(
            api_keys::table
                .filter(api_keys::id.eq(api_key_id))
                .filter(api_keys::user_id.eq(user_id)),
        )
        .set(api_keys::is_active.eq(false))
        .returning(ApiKeyEntity::as_returning())
        .get_result::<ApiKeyEntity>(&mut conn)
        .optional()?;

        Ok(revoked)
    }
}
