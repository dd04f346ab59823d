use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::users::UserEntity,
    value_objects::{credits::CreditAdjustment, enums::plan_names::PlanName},
};

#[automock]
#[async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>>;
    async fn set_plan(&self, user_id: Uuid, plan: PlanName) -> Result<()>;
    /// Adds `delta` (may be negative) under a row lock; never below zero.
    async fn adjust_credits(&self, user_id: Uuid, delta: i32) -> Result<CreditAdjustment>;
}
