use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::users},
};
use domain::{
    entities::users::UserEntity,
    repositories::users::UserRepository,
    value_objects::{credits::CreditAdjustment, enums::plan_names::PlanName},
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .find(user_id)
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn set_plan(&self, user_id: Uuid, plan: PlanName) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table.find(user_id))
            .set((
                users::plan.eq(plan.to_string()),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn adjust_credits(&self, user_id: Uuid, delta: i32) -> Result<CreditAdjustment> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            let current = users::table
                .filter(users::id.eq(user_id))
                .select(users::credits)
                .for_update()
                .first::<i32>(conn)
                .optional()?;

            let Some(balance) = current else {
                return Ok(CreditAdjustment::UserNotFound);
            };

            let next = balance.saturating_add(delta);
            if next < 0 {
                return Ok(CreditAdjustment::WouldGoNegative { balance });
            }

            update(users::table.find(user_id))
                .set((users::credits.eq(next), users::updated_at.eq(Utc::now())))
                .execute(conn)?;

            Ok(CreditAdjustment::Applied { balance: next })
        })
    }
}
