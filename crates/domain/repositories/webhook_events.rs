use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[automock]
#[async_trait]
pub trait WebhookEventRepository {
    /// `true` when the event was recorded now, `false` when it was seen before.
    async fn record(&self, gateway: &str, event_id: &str) -> Result<bool>;
    async fn release(&self, gateway: &str, event_id: &str) -> Result<()>;
}
