use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::api_rate_limit_events},
};
use domain::{
    entities::rate_limits::InsertRateLimitEventEntity,
    repositories::rate_limits::RateLimitRepository,
};

pub struct RateLimitPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl RateLimitPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RateLimitRepository for RateLimitPostgres {
    async fn record_and_load_window(
        &self,
        event: InsertRateLimitEventEntity,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Committed before the read, so concurrent callers always see each other.
        insert_into(api_rate_limit_events::table)
            .values(&event)
            .execute(&mut conn)?;

        let hits = api_rate_limit_events::table
            .filter(api_rate_limit_events::key.eq(&event.key))
            .filter(api_rate_limit_events::route.eq(&event.route))
            .filter(api_rate_limit_events::requested_at.gt(window_start))
            .select(api_rate_limit_events::requested_at)
            .load::<DateTime<Utc>>(&mut conn)?;

        Ok(hits)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = diesel::delete(
            api_rate_limit_events::table.filter(api_rate_limit_events::requested_at.lt(cutoff)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }
}
