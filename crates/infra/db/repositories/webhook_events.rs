use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::processed_webhook_events},
};
use domain::repositories::webhook_events::WebhookEventRepository;

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn record(&self, gateway: &str, event_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(processed_webhook_events::table)
            .values((
                processed_webhook_events::gateway.eq(gateway),
                processed_webhook_events::event_id.eq(event_id),
                processed_webhook_events::processed_at.eq(Utc::now()),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(inserted == 1)
    }

    async fn release(&self, gateway: &str, event_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::delete(
            processed_webhook_events::table
                .filter(processed_webhook_events::gateway.eq(gateway))
                .filter(processed_webhook_events::event_id.eq(event_id)),
        )
        .execute(&mut conn)?;

        Ok(())
    }
}
