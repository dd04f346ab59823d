use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{subscriptions, users},
    },
};
use domain::{
    entities::subscriptions::{SubscriptionEntity, SubscriptionTransitionEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_gateway_id(&self, gateway_subscription_id: &str) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = subscriptions::table
            .filter(subscriptions::gateway_subscription_id.eq(gateway_subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn apply_transition(
        &self,
        gateway_subscription_id: &str,
        transition: SubscriptionTransitionEntity,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let updated = update(
                subscriptions::table
                    .filter(subscriptions::gateway_subscription_id.eq(gateway_subscription_id)),
            )
            .set(&transition)
            .returning(SubscriptionEntity::as_returning())
            .get_result::<SubscriptionEntity>(conn)
            .optional()?;

            if let (Some(subscription), Some(status)) = (&updated, &transition.status) {
                update(users::table.find(subscription.user_id))
                    .set((
                        users::subscription_status.eq(Some(status.as_str())),
                        users::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
            }

            Ok(updated)
        })
    }

    async fn list_lapsed_grace(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = subscriptions::table
            .filter(subscriptions::status.eq_any([
                SubscriptionStatus::Canceled.to_string(),
                SubscriptionStatus::Incomplete.to_string(),
            ]))
            .filter(subscriptions::grace_until.is_not_null())
            .filter(subscriptions::grace_until.lt(now))
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(results)
    }

    async fn clear_grace(&self, subscription_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table.find(subscription_id))
            .set((
                subscriptions::grace_until.eq(None::<DateTime<Utc>>),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
