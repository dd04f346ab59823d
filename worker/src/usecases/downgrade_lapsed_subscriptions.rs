use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        repositories::{
            cache::CacheStore, subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::{billing::is_locked_out, enums::plan_names::PlanName},
    },
    infra::cache::{keys, typed},
};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DowngradeLapsedSubscriptionsResult {
    pub scanned: usize,
    pub downgraded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub downgraded_user_ids: Vec<Uuid>,
}

/// Moves owners of canceled or incomplete subscriptions back to FREE once their grace
/// window has passed.
pub struct DowngradeLapsedSubscriptionsUseCase {
    subscriptions: Arc<dyn SubscriptionRepository + Send + Sync>,
    users: Arc<dyn UserRepository + Send + Sync>,
    cache: Arc<dyn CacheStore>,
}

impl DowngradeLapsedSubscriptionsUseCase {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository + Send + Sync>,
        users: Arc<dyn UserRepository + Send + Sync>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            subscriptions,
            users,
            cache,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<DowngradeLapsedSubscriptionsResult> {
        let lapsed = self.subscriptions.list_lapsed_grace(now).await?;

        let mut result = DowngradeLapsedSubscriptionsResult {
            scanned: lapsed.len(),
            ..Default::default()
        };

        for listed in lapsed {
            // A renewal webhook may have landed since the listing query ran.
            let subscription = match self
                .subscriptions
                .find_by_gateway_id(&listed.gateway_subscription_id)
                .await
            {
                Ok(Some(current)) if is_locked_out(&current, now) => current,
                Ok(_) => {
                    info!(
                        subscription_id = %listed.id,
                        user_id = %listed.user_id,
                        "grace_downgrade: subscription no longer locked out, skipping"
                    );
                    result.skipped += 1;
                    continue;
                }
                Err(err) => {
                    error!(subscription_id = %listed.id, error = ?err, "grace_downgrade: failed to reload subscription");
                    result.failed += 1;
                    continue;
                }
            };

            if let Err(err) = self.users.set_plan(subscription.user_id, PlanName::Free).await {
                error!(
                    subscription_id = %subscription.id,
                    user_id = %subscription.user_id,
                    error = ?err,
                    "grace_downgrade: failed to set plan; will retry next run"
                );
                result.failed += 1;
                continue;
            }

            // grace_until stays set on failure, so the next run picks the row up again.
            if let Err(err) = self.subscriptions.clear_grace(subscription.id).await {
                error!(
                    subscription_id = %subscription.id,
                    error = ?err,
                    "grace_downgrade: plan downgraded but grace not cleared"
                );
                result.failed += 1;
            } else {
                result.downgraded += 1;
                result.downgraded_user_ids.push(subscription.user_id);
            }

            typed::invalidate(self.cache.as_ref(), &[keys::user_plan(subscription.user_id)]).await;
            info!(
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                "grace_downgrade: user moved to FREE"
            );
        }

        Ok(result)
    }
}
