use std::sync::Arc;

use crates::{
    domain::{
        repositories::{cache::CacheStore, users::UserRepository},
        value_objects::{credits::CreditAdjustment, qr_codes::CreditBalanceDto},
    },
    infra::cache::{keys, typed},
};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("credit delta must be non-zero")]
    InvalidDelta,
    #[error("adjustment of {delta} would take balance {balance} below zero")]
    WouldGoNegative { balance: i32, delta: i32 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UseCaseResult<T> = std::result::Result<T, CreditError>;

pub struct CreditsUseCase {
    user_repository: Arc<dyn UserRepository + Send + Sync>,
    cache: Arc<dyn CacheStore>,
}

impl CreditsUseCase {
    pub fn new(user_repository: Arc<dyn UserRepository + Send + Sync>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            user_repository,
            cache,
        }
    }

    pub async fn balance(&self, user_id: Uuid) -> UseCaseResult<CreditBalanceDto> {
        let cache_key = keys::user_credits(user_id);
        if let Some(balance) = typed::get_json::<CreditBalanceDto>(self.cache.as_ref(), &cache_key).await {
            return Ok(balance);
        }

        let user = self
            .user_repository
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: failed to load user");
                err
            })?
            .ok_or(CreditError::UserNotFound(user_id))?;

        let balance = CreditBalanceDto {
            credits: user.credits,
        };
        typed::set_json(self.cache.as_ref(), &cache_key, &balance, keys::USER_CREDITS_TTL).await;
        Ok(balance)
    }

    /// Administrative grant or debit. Every applied change lands in the audit log.
    pub async fn adjust(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        delta: i32,
        reason: Option<&str>,
    ) -> UseCaseResult<CreditBalanceDto> {
        if delta == 0 {
            return Err(CreditError::InvalidDelta);
        }

        let adjustment = self
            .user_repository
            .adjust_credits(user_id, delta)
            .await
            .map_err(|err| {
                error!(%user_id, delta, db_error = ?err, "credits: adjustment failed");
                err
            })?;

        match adjustment {
            CreditAdjustment::Applied { balance } => {
                info!(
                    target: "audit",
                    %admin_id,
                    %user_id,
                    delta,
                    balance,
                    reason = reason.unwrap_or(""),
                    "credits adjusted"
                );
                typed::invalidate(self.cache.as_ref(), &[keys::user_credits(user_id)]).await;
                Ok(CreditBalanceDto { credits: balance })
            }
            CreditAdjustment::UserNotFound => Err(CreditError::UserNotFound(user_id)),
            CreditAdjustment::WouldGoNegative { balance } => {
                Err(CreditError::WouldGoNegative { balance, delta })
            }
        }
    }

    /// Drops the cached balance after anything that spent credits.
    pub async fn forget_balance(&self, user_id: Uuid) {
        typed::invalidate(self.cache.as_ref(), &[keys::user_credits(user_id)]).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::entitlements::tests::sample_user;
    use crates::{
        domain::repositories::users::MockUserRepository, infra::cache::memory_cache::MemoryCache,
    };
    use mockall::predicate::eq;

    #[tokio::test]
    async fn balance_is_cached_after_first_read() {
        let user_id = Uuid::new_v4();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(user_id))
            .times(1)
            .returning(|id| Ok(Some(sample_user(id, "FREE", 7))));

        let usecase = CreditsUseCase::new(Arc::new(users), Arc::new(MemoryCache::new()));
        assert_eq!(usecase.balance(user_id).await.unwrap().credits, 7);
        assert_eq!(usecase.balance(user_id).await.unwrap().credits, 7);
    }

    #[tokio::test]
    async fn zero_delta_is_rejected_without_touching_the_store() {
        let usecase = CreditsUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MemoryCache::new()),
        );
        assert!(matches!(
            usecase.adjust(Uuid::new_v4(), Uuid::new_v4(), 0, None).await,
            Err(CreditError::InvalidDelta)
        ));
    }

    #[tokio::test]
    async fn applied_adjustment_refreshes_cached_balance() {
        let user_id = Uuid::new_v4();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(sample_user(id, "FREE", 5))));
        users
            .expect_adjust_credits()
            .with(eq(user_id), eq(10))
            .returning(|_, _| Ok(CreditAdjustment::Applied { balance: 15 }));

        let usecase = CreditsUseCase::new(Arc::new(users), Arc::new(MemoryCache::new()));
        assert_eq!(usecase.balance(user_id).await.unwrap().credits, 5);

        let adjusted = usecase
            .adjust(Uuid::new_v4(), user_id, 10, Some("support refund"))
            .await
            .unwrap();
        assert_eq!(adjusted.credits, 15);
        // cache was invalidated, so the next read goes back to the repository
        assert_eq!(usecase.balance(user_id).await.unwrap().credits, 5);
    }

    #[tokio::test]
    async fn negative_balance_is_refused() {
        let mut users = MockUserRepository::new();
        users
            .expect_adjust_credits()
            .returning(|_, _| Ok(CreditAdjustment::WouldGoNegative { balance: 3 }));
        let usecase = CreditsUseCase::new(Arc::new(users), Arc::new(MemoryCache::new()));

        match usecase.adjust(Uuid::new_v4(), Uuid::new_v4(), -5, None).await {
            Err(CreditError::WouldGoNegative { balance, delta }) => {
                assert_eq!(balance, 3);
                assert_eq!(delta, -5);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
