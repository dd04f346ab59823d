use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::webhook_logs::{InsertWebhookLogEntity, WebhookLogEntity},
    value_objects::webhooks::{DeliveryOutcome, WebhookLogStatus},
};

#[automock]
#[async_trait]
pub trait WebhookLogRepository {
    async fn create_attempt(&self, log: InsertWebhookLogEntity) -> Result<WebhookLogEntity>;
    async fn record_outcome(&self, log_id: Uuid, outcome: DeliveryOutcome) -> Result<()>;
    /// Increments `attempts`, stamps `last_attempt_at` and records the endpoint before a redelivery.
    async fn begin_retry(
        &self,
        log_id: Uuid,
        webhook_url: String,
        attempted_at: DateTime<Utc>,
    ) -> Result<WebhookLogEntity>;
    async fn find_by_id(&self, log_id: Uuid) -> Result<Option<WebhookLogEntity>>;
    async fn list_for_qr_code(
        &self,
        qr_code_id: Uuid,
        status: Option<WebhookLogStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WebhookLogEntity>, i64)>;
    /// Failed deliveries that are due at `now` (`last_attempt_at + 2^attempts minutes`), have
    /// fewer than `max_attempts` attempts and whose QR code still has a webhook, oldest first.
    async fn list_retryable(
        &self,
        max_attempts: i32,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookLogEntity>>;
}
