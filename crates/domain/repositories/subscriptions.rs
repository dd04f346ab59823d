use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{SubscriptionEntity, SubscriptionTransitionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_gateway_id(&self, gateway_subscription_id: &str) -> Result<Option<SubscriptionEntity>>;
    /// Applies the transition and mirrors the new status onto the owner.
    async fn apply_transition(
        &self,
        gateway_subscription_id: &str,
        transition: SubscriptionTransitionEntity,
    ) -> Result<Option<SubscriptionEntity>>;
    /// Canceled or incomplete subscriptions whose grace period ended before `now`.
    async fn list_lapsed_grace(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>>;
    async fn clear_grace(&self, subscription_id: Uuid) -> Result<()>;
}
