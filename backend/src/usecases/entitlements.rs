use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use crates::{
    domain::{
        repositories::{
            cache::CacheStore, qr_code_scans::QrCodeScanRepository, qr_codes::QrCodeRepository,
            users::UserRepository,
        },
        value_objects::{
            enums::plan_names::PlanName,
            plans::{EntitlementsDto, Feature, PlanEntitlements, UsageSnapshot, has_feature},
        },
    },
    infra::cache::{keys, typed},
};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("QR code limit reached for plan {plan} ({current}/{limit})")]
    QrLimit {
        plan: PlanName,
        limit: i64,
        current: i64,
    },
    #[error("monthly scan quota reached for plan {plan} ({current}/{limit})")]
    ScanQuota {
        plan: PlanName,
        limit: i64,
        current: i64,
    },
    #[error("feature {} not allowed on plan {plan}", .feature.as_str())]
    FeatureNotAllowed { feature: Feature, plan: PlanName },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UseCaseResult<T> = std::result::Result<T, EntitlementError>;

/// Plan limits and feature gates. Credits are never checked here.
pub struct EntitlementsUseCase {
    user_repository: Arc<dyn UserRepository + Send + Sync>,
    qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
    scan_repository: Arc<dyn QrCodeScanRepository + Send + Sync>,
    cache: Arc<dyn CacheStore>,
}

impl EntitlementsUseCase {
    pub fn new(
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
        scan_repository: Arc<dyn QrCodeScanRepository + Send + Sync>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            user_repository,
            qr_code_repository,
            scan_repository,
            cache,
        }
    }

    pub async fn get_user_plan(&self, user_id: Uuid) -> UseCaseResult<PlanName> {
        let cache_key = keys::user_plan(user_id);
        if let Some(plan) = typed::get_json::<PlanName>(self.cache.as_ref(), &cache_key).await {
            return Ok(plan);
        }

        let user = self
            .user_repository
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "entitlements: failed to load user");
                err
            })?
            .ok_or(EntitlementError::UserNotFound(user_id))?;

        let plan = PlanName::from_str(&user.plan);
        typed::set_json(self.cache.as_ref(), &cache_key, &plan, keys::USER_PLAN_TTL).await;
        Ok(plan)
    }

    pub async fn get_usage(&self, user_id: Uuid) -> UseCaseResult<UsageSnapshot> {
        let qr_codes = self.qr_code_repository.count_by_user(user_id).await?;
        let scans_this_month = self
            .scan_repository
            .count_for_owner_since(user_id, start_of_month(Utc::now()))
            .await?;

        Ok(UsageSnapshot {
            qr_codes,
            scans_this_month,
        })
    }

    /// Fails when `additional` more QR codes would exceed the plan limit.
    pub async fn assert_can_create_qr(
        &self,
        user_id: Uuid,
        additional: i64,
    ) -> UseCaseResult<PlanName> {
        let plan = self.get_user_plan(user_id).await?;
        let limit = PlanEntitlements::for_plan(plan).max_qr_codes;
        let current = self.qr_code_repository.count_by_user(user_id).await?;

        if current + additional > limit {
            info!(%user_id, %plan, limit, current, additional, "entitlements: QR code limit reached");
            return Err(EntitlementError::QrLimit {
                plan,
                limit,
                current,
            });
        }
        Ok(plan)
    }

    pub async fn assert_within_monthly_scan_quota(&self, user_id: Uuid) -> UseCaseResult<PlanName> {
        let plan = self.get_user_plan(user_id).await?;
        let limit = PlanEntitlements::for_plan(plan).monthly_scans;
        let current = self
            .scan_repository
            .count_for_owner_since(user_id, start_of_month(Utc::now()))
            .await?;

        if current >= limit {
            info!(%user_id, %plan, limit, current, "entitlements: monthly scan quota reached");
            return Err(EntitlementError::ScanQuota {
                plan,
                limit,
                current,
            });
        }
        Ok(plan)
    }

    pub async fn assert_feature(&self, user_id: Uuid, feature: Feature) -> UseCaseResult<PlanName> {
        let plan = self.get_user_plan(user_id).await?;
        ensure_feature(plan, feature)?;
        Ok(plan)
    }

    pub async fn entitlements(&self, user_id: Uuid) -> UseCaseResult<EntitlementsDto> {
        let plan = self.get_user_plan(user_id).await?;
        let usage = self.get_usage(user_id).await?;
        Ok(EntitlementsDto {
            plan,
            entitlements: PlanEntitlements::for_plan(plan),
            usage,
        })
    }
}

pub fn ensure_feature(plan: PlanName, feature: Feature) -> UseCaseResult<()> {
    if has_feature(plan, feature) {
        Ok(())
    } else {
        Err(EntitlementError::FeatureNotAllowed { feature, plan })
    }
}

pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crates::{
        domain::{
            entities::users::UserEntity,
            repositories::{
                qr_code_scans::MockQrCodeScanRepository, qr_codes::MockQrCodeRepository,
                users::MockUserRepository,
            },
        },
        infra::cache::memory_cache::MemoryCache,
    };
    use mockall::{Sequence, predicate::eq};
    use std::time::Duration;

    pub fn sample_user(user_id: Uuid, plan: &str, credits: i32) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            id: user_id,
            email: "owner@example.com".to_string(),
            name: Some("Owner".to_string()),
            plan: plan.to_string(),
            credits,
            subscription_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn entitlements_with(
        user_id: Uuid,
        plan: &'static str,
        qr_count: i64,
        scans: i64,
    ) -> EntitlementsUseCase {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(user_id))
            .returning(move |id| Ok(Some(sample_user(id, plan, 10))));

        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes
            .expect_count_by_user()
            .returning(move |_| Ok(qr_count));

        let mut scan_repository = MockQrCodeScanRepository::new();
        scan_repository
            .expect_count_for_owner_since()
            .returning(move |_, _| Ok(scans));

        EntitlementsUseCase::new(
            Arc::new(users),
            Arc::new(qr_codes),
            Arc::new(scan_repository),
            Arc::new(MemoryCache::new()),
        )
    }

    #[tokio::test]
    async fn plan_is_loaded_once_then_served_from_cache() {
        let user_id = Uuid::new_v4();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(user_id))
            .times(1)
            .returning(|id| Ok(Some(sample_user(id, "pro", 0))));

        let usecase = EntitlementsUseCase::new(
            Arc::new(users),
            Arc::new(MockQrCodeRepository::new()),
            Arc::new(MockQrCodeScanRepository::new()),
            Arc::new(MemoryCache::new()),
        );

        assert_eq!(usecase.get_user_plan(user_id).await.unwrap(), PlanName::Pro);
        assert_eq!(usecase.get_user_plan(user_id).await.unwrap(), PlanName::Pro);
    }

    #[tokio::test(start_paused = true)]
    async fn downgrade_takes_effect_once_the_cached_plan_expires() {
        let user_id = Uuid::new_v4();
        let mut seq = Sequence::new();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| Ok(Some(sample_user(id, "PRO", 0))));
        users
            .expect_find_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| Ok(Some(sample_user(id, "FREE", 0))));

        let usecase = EntitlementsUseCase::new(
            Arc::new(users),
            Arc::new(MockQrCodeRepository::new()),
            Arc::new(MockQrCodeScanRepository::new()),
            Arc::new(MemoryCache::new()),
        );

        assert!(usecase.assert_feature(user_id, Feature::Webhooks).await.is_ok());

        tokio::time::advance(keys::USER_PLAN_TTL - Duration::from_secs(1)).await;
        assert!(usecase.assert_feature(user_id, Feature::Webhooks).await.is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(
            usecase.assert_feature(user_id, Feature::Webhooks).await,
            Err(EntitlementError::FeatureNotAllowed {
                feature: Feature::Webhooks,
                plan: PlanName::Free
            })
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));
        let usecase = EntitlementsUseCase::new(
            Arc::new(users),
            Arc::new(MockQrCodeRepository::new()),
            Arc::new(MockQrCodeScanRepository::new()),
            Arc::new(MemoryCache::new()),
        );

        let err = usecase.get_user_plan(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EntitlementError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn free_plan_stops_at_ten_qr_codes() {
        let user_id = Uuid::new_v4();
        let usecase = entitlements_with(user_id, "FREE", 10, 0);

        match usecase.assert_can_create_qr(user_id, 1).await.unwrap_err() {
            EntitlementError::QrLimit {
                plan,
                limit,
                current,
            } => {
                assert_eq!(plan, PlanName::Free);
                assert_eq!(limit, 10);
                assert_eq!(current, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let usecase = entitlements_with(user_id, "FREE", 9, 0);
        assert!(usecase.assert_can_create_qr(user_id, 1).await.is_ok());
        assert!(usecase.assert_can_create_qr(user_id, 2).await.is_err());
    }

    #[tokio::test]
    async fn monthly_scan_quota_is_enforced() {
        let user_id = Uuid::new_v4();
        let usecase = entitlements_with(user_id, "FREE", 0, 1_000);
        assert!(matches!(
            usecase.assert_within_monthly_scan_quota(user_id).await,
            Err(EntitlementError::ScanQuota { limit: 1_000, .. })
        ));

        let usecase = entitlements_with(user_id, "FLEX", 0, 1_000);
        assert!(usecase.assert_within_monthly_scan_quota(user_id).await.is_ok());
    }

    #[tokio::test]
    async fn feature_gate_reports_plan() {
        let user_id = Uuid::new_v4();
        let usecase = entitlements_with(user_id, "FLEX", 0, 0);

        assert!(usecase.assert_feature(user_id, Feature::DynamicQr).await.is_ok());
        assert!(matches!(
            usecase.assert_feature(user_id, Feature::Webhooks).await,
            Err(EntitlementError::FeatureNotAllowed {
                feature: Feature::Webhooks,
                plan: PlanName::Flex
            })
        ));
    }

    #[tokio::test]
    async fn entitlements_bundle_plan_and_usage() {
        let user_id = Uuid::new_v4();
        let usecase = entitlements_with(user_id, "business", 42, 7);

        let dto = usecase.entitlements(user_id).await.unwrap();
        assert_eq!(dto.plan, PlanName::Business);
        assert_eq!(dto.entitlements.max_qr_codes, 10_000);
        assert_eq!(dto.usage.qr_codes, 42);
        assert_eq!(dto.usage.scans_this_month, 7);
    }

    #[test]
    fn month_starts_at_midnight_utc_on_the_first() {
        let now = Utc.with_ymd_and_hms(2024, 3, 17, 15, 4, 5).unwrap();
        assert_eq!(
            start_of_month(now),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
