use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::webhooks::DeliveryOutcome;

/// Performs one HTTP delivery, signed when a signature is given.
/// Transport failures are folded into the outcome.
#[automock]
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    async fn deliver(&self, url: &str, body: &str, signature: Option<String>) -> DeliveryOutcome;
}
