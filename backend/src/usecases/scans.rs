use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        repositories::{
            cache::CacheStore, qr_code_scans::QrCodeScanRepository, qr_codes::QrCodeRepository,
        },
        value_objects::{
            qr_codes::RateLimitConfig,
            rate_limits::RateLimitPolicy,
            scans::{ScanAnalyticsDto, ScanContext, ScanResultDto, ScanWebhookPayload, aggregate_scans},
        },
    },
    infra::cache::{keys, typed},
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    access::AccessPolicy,
    entitlements::{EntitlementError, EntitlementsUseCase},
    rate_limiter::{RateLimitError, RateLimiter},
    side_effects::{SideEffect, SideEffectQueue},
    webhook_outbox::ScanWebhookJob,
};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("QR code {0} not found")]
    QrCodeNotFound(Uuid),
    #[error("QR code is inactive")]
    Inactive,
    #[error("QR code has expired")]
    Expired,
    #[error("QR code scan limit reached")]
    LimitReached,
    #[error("no access to this QR code's analytics")]
    Forbidden,
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UseCaseResult<T> = std::result::Result<T, ScanError>;

pub struct ScansUseCase {
    qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
    scan_repository: Arc<dyn QrCodeScanRepository + Send + Sync>,
    entitlements: Arc<EntitlementsUseCase>,
    access: Arc<AccessPolicy>,
    rate_limiter: Arc<RateLimiter>,
    side_effects: SideEffectQueue,
    cache: Arc<dyn CacheStore>,
}

impl ScansUseCase {
    pub fn new(
        qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
        scan_repository: Arc<dyn QrCodeScanRepository + Send + Sync>,
        entitlements: Arc<EntitlementsUseCase>,
        access: Arc<AccessPolicy>,
        rate_limiter: Arc<RateLimiter>,
        side_effects: SideEffectQueue,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            qr_code_repository,
            scan_repository,
            entitlements,
            access,
            rate_limiter,
            side_effects,
            cache,
        }
    }

    pub async fn record(&self, qr_code_id: Uuid, context: ScanContext) -> UseCaseResult<ScanResultDto> {
        let now = Utc::now();
        let qr_code = self
            .qr_code_repository
            .find_by_id(qr_code_id)
            .await?
            .ok_or(ScanError::QrCodeNotFound(qr_code_id))?;

        if !qr_code.is_active {
            return Err(ScanError::Inactive);
        }
        if qr_code.is_expired_at(now) {
            return Err(ScanError::Expired);
        }
        if qr_code.scan_limit_reached() {
            return Err(ScanError::LimitReached);
        }

        let config = qr_code
            .rate_limit_config
            .clone()
            .and_then(|value| serde_json::from_value::<RateLimitConfig>(value).ok());
        let ip = context.ip_address.as_deref().unwrap_or("unknown");
        self.rate_limiter
            .enforce(&format!("scan:{ip}:{qr_code_id}"), &RateLimitPolicy::qr_scan(config.as_ref()))
            .await?;

        self.entitlements
            .assert_within_monthly_scan_quota(qr_code.user_id)
            .await?;

        // The store re-checks max_scans inside the insert transaction.
        let Some(scan) = self
            .scan_repository
            .record_scan(context.into_insert_entity(qr_code_id, now))
            .await?
        else {
            debug!(%qr_code_id, "scans: lost the race for the last allowed scan");
            return Err(ScanError::LimitReached);
        };

        let redirect_url = qr_code.destination().to_string();
        if let Some(webhook_url) = &qr_code.webhook_url {
            self.side_effects
                .submit(SideEffect::DeliverScanWebhook(ScanWebhookJob {
                    qr_code_id,
                    webhook_url: webhook_url.clone(),
                    secret: qr_code.webhook_secret.clone(),
                    payload: ScanWebhookPayload::from_scan(&scan, &redirect_url),
                }));
        }

        typed::invalidate(
            self.cache.as_ref(),
            &[keys::qr_code(qr_code_id), keys::scan_stats(qr_code_id)],
        )
        .await;
        info!(%qr_code_id, scan_id = %scan.id, "scans: recorded");

        Ok(ScanResultDto {
            success: true,
            scan_id: scan.id,
            redirect_url,
        })
    }

    pub async fn analytics(&self, user_id: Uuid, qr_code_id: Uuid) -> UseCaseResult<ScanAnalyticsDto> {
        let qr_code = self
            .qr_code_repository
            .find_by_id(qr_code_id)
            .await?
            .ok_or(ScanError::QrCodeNotFound(qr_code_id))?;
        if !self.access.can_view(user_id, &qr_code).await? {
            return Err(ScanError::Forbidden);
        }

        let scan_repository = Arc::clone(&self.scan_repository);
        let analytics = typed::get_or_set(
            self.cache.as_ref(),
            &keys::scan_stats(qr_code_id),
            keys::SCAN_STATS_TTL,
            || async move {
                let scans = scan_repository.list_by_qr_code(qr_code_id).await?;
                Ok(aggregate_scans(&scans))
            },
        )
        .await?;
        Ok(analytics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        access::tests::sample_qr,
        entitlements::tests::entitlements_with,
        rate_limiter::tests::{exhausted_limiter, permissive_limiter},
    };
    use chrono::Duration;
    use crates::{
        domain::{
            entities::qr_code_scans::QrCodeScanEntity,
            entities::qr_codes::QrCodeEntity,
            repositories::{
                organizations::MockOrganizationRepository,
                qr_code_scans::MockQrCodeScanRepository, qr_codes::MockQrCodeRepository,
            },
        },
        infra::cache::memory_cache::MemoryCache,
    };
    use tokio::sync::mpsc;

    struct Fixture {
        owner: Uuid,
        qr_code: QrCodeEntity,
    }

    impl Fixture {
        fn new() -> Self {
            let owner = Uuid::new_v4();
            Self {
                owner,
                qr_code: sample_qr(Uuid::new_v4(), owner, None),
            }
        }

        fn usecase(
            &self,
            scans: MockQrCodeScanRepository,
            monthly_scans: i64,
            limiter: RateLimiter,
        ) -> (ScansUseCase, mpsc::Receiver<SideEffect>) {
            let qr_code = self.qr_code.clone();
            let mut qr_codes = MockQrCodeRepository::new();
            qr_codes
                .expect_find_by_id()
                .returning(move |_| Ok(Some(qr_code.clone())));
            let mut organizations = MockOrganizationRepository::new();
            organizations
                .expect_find_member_role()
                .returning(|_, _| Ok(None));

            let (queue, rx) = SideEffectQueue::new(8);
            let usecase = ScansUseCase::new(
                Arc::new(qr_codes),
                Arc::new(scans),
                Arc::new(entitlements_with(self.owner, "FREE", 0, monthly_scans)),
                Arc::new(AccessPolicy::new(Arc::new(organizations))),
                Arc::new(limiter),
                queue,
                Arc::new(MemoryCache::new()),
            );
            (usecase, rx)
        }
    }

    fn stored_scan(insert: crates::domain::entities::qr_code_scans::InsertQrCodeScanEntity) -> QrCodeScanEntity {
        QrCodeScanEntity {
            id: Uuid::new_v4(),
            qr_code_id: insert.qr_code_id,
            user_agent: insert.user_agent,
            ip_address: insert.ip_address,
            country: insert.country,
            city: insert.city,
            device: insert.device,
            browser: insert.browser,
            os: insert.os,
            scanned_at: insert.scanned_at,
        }
    }

    fn context() -> ScanContext {
        ScanContext {
            user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148".to_string()),
            ip_address: Some("203.0.113.7".to_string()),
            country: Some("IN".to_string()),
            city: Some("Pune".to_string()),
        }
    }

    #[tokio::test]
    async fn scan_is_recorded_and_redirects_to_the_destination() {
        let mut fixture = Fixture::new();
        fixture.qr_code.redirect_url = Some("https://example.com/landing".to_string());
        let mut scans = MockQrCodeScanRepository::new();
        scans
            .expect_record_scan()
            .withf(|insert| insert.device.as_deref() == Some("mobile"))
            .times(1)
            .returning(|insert| Ok(Some(stored_scan(insert))));

        let (usecase, mut rx) = fixture.usecase(scans, 0, permissive_limiter());
        let result = usecase.record(fixture.qr_code.id, context()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.redirect_url, "https://example.com/landing");
        // no webhook configured
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn configured_webhooks_are_enqueued() {
        let mut fixture = Fixture::new();
        fixture.qr_code.webhook_url = Some("https://hooks.example.com".to_string());
        fixture.qr_code.webhook_secret = Some("whsec".to_string());
        let mut scans = MockQrCodeScanRepository::new();
        scans
            .expect_record_scan()
            .returning(|insert| Ok(Some(stored_scan(insert))));

        let (usecase, mut rx) = fixture.usecase(scans, 0, permissive_limiter());
        let result = usecase.record(fixture.qr_code.id, context()).await.unwrap();

        match rx.try_recv().unwrap() {
            SideEffect::DeliverScanWebhook(job) => {
                assert_eq!(job.payload.scan_id, result.scan_id);
                assert_eq!(job.secret.as_deref(), Some("whsec"));
                assert_eq!(job.payload.country.as_deref(), Some("IN"));
            }
            other => panic!("unexpected side effect: {other:?}"),
        }
    }

    #[tokio::test]
    async fn inactive_expired_and_exhausted_codes_are_refused() {
        let mut fixture = Fixture::new();
        fixture.qr_code.is_active = false;
        let (usecase, _rx) = fixture.usecase(MockQrCodeScanRepository::new(), 0, permissive_limiter());
        assert!(matches!(usecase.record(fixture.qr_code.id, context()).await, Err(ScanError::Inactive)));

        let mut fixture = Fixture::new();
        fixture.qr_code.expires_at = Some(Utc::now() - Duration::minutes(1));
        let (usecase, _rx) = fixture.usecase(MockQrCodeScanRepository::new(), 0, permissive_limiter());
        assert!(matches!(usecase.record(fixture.qr_code.id, context()).await, Err(ScanError::Expired)));

        let mut fixture = Fixture::new();
        fixture.qr_code.max_scans = Some(5);
        fixture.qr_code.scan_count = 5;
        let (usecase, _rx) = fixture.usecase(MockQrCodeScanRepository::new(), 0, permissive_limiter());
        assert!(matches!(
            usecase.record(fixture.qr_code.id, context()).await,
            Err(ScanError::LimitReached)
        ));
    }

    #[tokio::test]
    async fn conditional_increment_losing_the_race_reports_limit_reached() {
        let mut fixture = Fixture::new();
        fixture.qr_code.max_scans = Some(5);
        fixture.qr_code.scan_count = 4;
        let mut scans = MockQrCodeScanRepository::new();
        scans.expect_record_scan().returning(|_| Ok(None));

        let (usecase, _rx) = fixture.usecase(scans, 0, permissive_limiter());
        assert!(matches!(
            usecase.record(fixture.qr_code.id, context()).await,
            Err(ScanError::LimitReached)
        ));
    }

    #[tokio::test]
    async fn owner_quota_and_rate_limit_block_before_insert() {
        let fixture = Fixture::new();
        let mut scans = MockQrCodeScanRepository::new();
        scans.expect_record_scan().never();

        let (usecase, _rx) = fixture.usecase(scans, 1_000, permissive_limiter());
        assert!(matches!(
            usecase.record(fixture.qr_code.id, context()).await,
            Err(ScanError::Entitlement(EntitlementError::ScanQuota { .. }))
        ));

        let mut scans = MockQrCodeScanRepository::new();
        scans.expect_record_scan().never();
        let (usecase, _rx) = fixture.usecase(scans, 0, exhausted_limiter());
        assert!(matches!(
            usecase.record(fixture.qr_code.id, context()).await,
            Err(ScanError::RateLimit(RateLimitError::Limited { .. }))
        ));
    }

    #[tokio::test]
    async fn analytics_are_owner_only_and_cached() {
        let fixture = Fixture::new();
        let qr_code_id = fixture.qr_code.id;
        let mut scans = MockQrCodeScanRepository::new();
        scans
            .expect_list_by_qr_code()
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let (usecase, _rx) = fixture.usecase(scans, 0, permissive_limiter());
        assert_eq!(usecase.analytics(fixture.owner, qr_code_id).await.unwrap().total_scans, 0);
        assert_eq!(usecase.analytics(fixture.owner, qr_code_id).await.unwrap().total_scans, 0);
        assert!(matches!(
            usecase.analytics(Uuid::new_v4(), qr_code_id).await,
            Err(ScanError::Forbidden)
        ));
    }
}
