use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    OptionalExtension, RunQueryDsl,
    dsl::sql,
    insert_into,
    pg::Pg,
    prelude::*,
    sql_types::{Bool, Timestamptz},
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{qr_code_webhook_logs, qr_codes},
    },
};
use domain::{
    entities::webhook_logs::{InsertWebhookLogEntity, WebhookLogEntity},
    repositories::webhook_logs::WebhookLogRepository,
    value_objects::webhooks::{DeliveryOutcome, WebhookLogStatus},
};

pub struct WebhookLogPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookLogPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn logs_for<'a>(
    qr_code_id: Uuid,
    status: Option<WebhookLogStatus>,
) -> qr_code_webhook_logs::BoxedQuery<'a, Pg> {
    let mut query = qr_code_webhook_logs::table
        .filter(qr_code_webhook_logs::qr_code_id.eq(qr_code_id))
        .into_boxed();

    if let Some(status) = status {
        query = query.filter(qr_code_webhook_logs::is_successful.eq(status.is_successful()));
    }

    query
}

#[async_trait]
impl WebhookLogRepository for WebhookLogPostgres {
    async fn create_attempt(&self, log: InsertWebhookLogEntity) -> Result<WebhookLogEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = insert_into(qr_code_webhook_logs::table)
            .values(&log)
            .returning(WebhookLogEntity::as_returning())
            .get_result::<WebhookLogEntity>(&mut conn)?;

        Ok(created)
    }

    async fn record_outcome(&self, log_id: Uuid, outcome: DeliveryOutcome) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(qr_code_webhook_logs::table.find(log_id))
            .set((
                qr_code_webhook_logs::response_status.eq(outcome.response_status),
                qr_code_webhook_logs::response_body.eq(outcome.response_body),
                qr_code_webhook_logs::is_successful.eq(outcome.is_successful),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn begin_retry(
        &self,
        log_id: Uuid,
        webhook_url: String,
        attempted_at: DateTime<Utc>,
    ) -> Result<WebhookLogEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(qr_code_webhook_logs::table.find(log_id))
            .set((
                qr_code_webhook_logs::attempts.eq(qr_code_webhook_logs::attempts + 1),
                qr_code_webhook_logs::last_attempt_at.eq(attempted_at),
                qr_code_webhook_logs::webhook_url.eq(webhook_url),
            ))
            .returning(WebhookLogEntity::as_returning())
            .get_result::<WebhookLogEntity>(&mut conn)?;

        Ok(updated)
    }

    async fn find_by_id(&self, log_id: Uuid) -> Result<Option<WebhookLogEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let log = qr_code_webhook_logs::table
            .find(log_id)
            .select(WebhookLogEntity::as_select())
            .first::<WebhookLogEntity>(&mut conn)
            .optional()?;

        Ok(log)
    }

    async fn list_for_qr_code(
        &self,
        qr_code_id: Uuid,
        status: Option<WebhookLogStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WebhookLogEntity>, i64)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let logs = logs_for(qr_code_id, status)
            .order(qr_code_webhook_logs::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(WebhookLogEntity::as_select())
            .load::<WebhookLogEntity>(&mut conn)?;

        let total = logs_for(qr_code_id, status)
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok((logs, total))
    }

    async fn list_retryable(
        &self,
        max_attempts: i32,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookLogEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // last_attempt_at + 2^attempts minutes, exponent capped at 16.
        let due = sql::<Bool>(
            "qr_code_webhook_logs.last_attempt_at \
             + make_interval(mins => power(2, LEAST(GREATEST(qr_code_webhook_logs.attempts, 0), 16))::int) <= ",
        )
        .bind::<Timestamptz, _>(now);

        let results = qr_code_webhook_logs::table
            .inner_join(qr_codes::table)
            .filter(qr_codes::webhook_url.is_not_null())
            .filter(qr_code_webhook_logs::is_successful.eq(false))
            .filter(qr_code_webhook_logs::attempts.lt(max_attempts))
            .filter(due)
            .order(qr_code_webhook_logs::last_attempt_at.asc())
            .limit(limit)
            .select(WebhookLogEntity::as_select())
            .load::<WebhookLogEntity>(&mut conn)?;

        Ok(results)
    }
}
