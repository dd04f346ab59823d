use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::{
            qr_codes::QrCodeEntity,
            webhook_logs::{InsertWebhookLogEntity, WebhookLogEntity},
        },
        repositories::{
            qr_codes::QrCodeRepository, webhook_dispatcher::WebhookDispatcher,
            webhook_logs::WebhookLogRepository,
        },
        value_objects::{
            api_keys::ApiKeyPrincipal,
            plans::Feature,
            scans::ScanWebhookPayload,
            validation::FieldError,
            webhooks::{
                ConfigureWebhookModel, ConfiguredWebhookDto, DeliveryOutcome, Pagination,
                WebhookConfigDto, WebhookLogDto, WebhookLogPageDto, WebhookLogsQuery,
            },
        },
    },
    infra::security::signatures::{generate_webhook_secret, sign_payload},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    access::AccessPolicy,
    entitlements::{EntitlementError, EntitlementsUseCase},
};

/// Logs picked per retry sweep.
const RETRY_BATCH_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Validation(FieldError),
    #[error("QR code {0} not found")]
    QrCodeNotFound(Uuid),
    #[error("webhook log {0} not found")]
    LogNotFound(Uuid),
    #[error("QR code belongs to another tenant")]
    Forbidden,
    #[error("QR code {0} has no webhook configured")]
    NotConfigured(Uuid),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<FieldError> for WebhookError {
    fn from(err: FieldError) -> Self {
        WebhookError::Validation(err)
    }
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

/// One scan notification waiting to be posted.
#[derive(Debug, Clone)]
pub struct ScanWebhookJob {
    pub qr_code_id: Uuid,
    pub webhook_url: String,
    pub secret: Option<String>,
    pub payload: ScanWebhookPayload,
}

pub struct WebhookOutboxUseCase {
    qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
    log_repository: Arc<dyn WebhookLogRepository + Send + Sync>,
    dispatcher: Arc<dyn WebhookDispatcher>,
    entitlements: Arc<EntitlementsUseCase>,
    access: Arc<AccessPolicy>,
    max_attempts: i32,
}

impl WebhookOutboxUseCase {
    pub fn new(
        qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
        log_repository: Arc<dyn WebhookLogRepository + Send + Sync>,
        dispatcher: Arc<dyn WebhookDispatcher>,
        entitlements: Arc<EntitlementsUseCase>,
        access: Arc<AccessPolicy>,
        max_attempts: i32,
    ) -> Self {
        Self {
            qr_code_repository,
            log_repository,
            dispatcher,
            entitlements,
            access,
            max_attempts,
        }
    }

    /// Writes the log row, then posts. The row exists even if the process dies mid-request.
    pub async fn deliver_scan(&self, job: ScanWebhookJob) -> UseCaseResult<DeliveryOutcome> {
        let body = serde_json::to_string(&job.payload).map_err(anyhow::Error::from)?;
        let payload = serde_json::to_value(&job.payload).map_err(anyhow::Error::from)?;

        let log = self
            .log_repository
            .create_attempt(InsertWebhookLogEntity {
                qr_code_id: job.qr_code_id,
                webhook_url: job.webhook_url.clone(),
                payload,
                is_successful: false,
                attempts: 1,
                last_attempt_at: Utc::now(),
            })
            .await
            .map_err(|err| {
                error!(qr_code_id = %job.qr_code_id, db_error = ?err, "webhook_outbox: failed to create log");
                err
            })?;

        self.post(&log, &job.webhook_url, &body, job.secret.as_deref())
            .await
    }

    pub async fn list_configs(&self, principal: &ApiKeyPrincipal) -> UseCaseResult<Vec<WebhookConfigDto>> {
        let owner_ids = self.access.principal_owner_ids(principal).await?;
        let configured = self.qr_code_repository.list_webhook_configs(owner_ids).await?;
        Ok(configured.iter().map(WebhookConfigDto::from).collect())
    }

    pub async fn configure(
        &self,
        principal: &ApiKeyPrincipal,
        model: ConfigureWebhookModel,
    ) -> UseCaseResult<ConfiguredWebhookDto> {
        let (qr_code_id, webhook_url) = model.validate()?;
        let qr_code = self.accessible_qr_code(principal, qr_code_id).await?;

        self.entitlements
            .assert_feature(qr_code.user_id, Feature::Webhooks)
            .await?;

        let secret = (qr_code.webhook_secret.is_none() || model.regenerate_secret)
            .then(generate_webhook_secret);
        self.qr_code_repository
            .set_webhook(qr_code_id, webhook_url.clone(), secret.clone())
            .await?;

        info!(
            key_id = %principal.key_id,
            %qr_code_id,
            secret_rotated = secret.is_some(),
            "webhook_outbox: webhook configured"
        );
        Ok(ConfiguredWebhookDto {
            qr_code_id,
            webhook_url,
            secret,
        })
    }

    pub async fn remove(&self, principal: &ApiKeyPrincipal, qr_code_id: Option<Uuid>) -> UseCaseResult<()> {
        let qr_code_id = qr_code_id.ok_or_else(|| FieldError::missing("qrCodeId"))?;
        self.accessible_qr_code(principal, qr_code_id).await?;
        self.qr_code_repository.clear_webhook(qr_code_id).await?;
        info!(key_id = %principal.key_id, %qr_code_id, "webhook_outbox: webhook removed");
        Ok(())
    }

    pub async fn list_logs(
        &self,
        principal: &ApiKeyPrincipal,
        qr_code_id: Uuid,
        query: WebhookLogsQuery,
    ) -> UseCaseResult<WebhookLogPageDto> {
        self.accessible_qr_code(principal, qr_code_id).await?;

        let limit = query.limit();
        let offset = query.offset();
        let (logs, total) = self
            .log_repository
            .list_for_qr_code(qr_code_id, query.status, limit, offset)
            .await?;

        Ok(WebhookLogPageDto {
            logs: logs.into_iter().map(WebhookLogDto::from).collect(),
            pagination: Pagination {
                total,
                limit,
                offset,
                has_more: offset + limit < total,
            },
        })
    }

    /// Explicit redelivery of a stored payload with a fresh signature.
    pub async fn retry(
        &self,
        principal: &ApiKeyPrincipal,
        qr_code_id: Uuid,
        log_id: Option<Uuid>,
    ) -> UseCaseResult<WebhookLogDto> {
        let log_id = log_id.ok_or_else(|| FieldError::missing("logId"))?;
        let qr_code = self.accessible_qr_code(principal, qr_code_id).await?;

        let log = self
            .log_repository
            .find_by_id(log_id)
            .await?
            .filter(|log| log.qr_code_id == qr_code_id)
            .ok_or(WebhookError::LogNotFound(log_id))?;

        let (log, outcome) = self.redeliver(&qr_code, log).await?;
        Ok(WebhookLogDto {
            response_status: outcome.response_status,
            response_body: outcome.response_body,
            is_successful: outcome.is_successful,
            ..WebhookLogDto::from(log)
        })
    }

    /// Retries failed deliveries whose backoff has elapsed. Returns how many were attempted.
    ///
    /// Due-ness and "webhook still configured" are filtered by the repository, so every
    /// candidate in the batch is deliverable unless the QR code changed in between.
    pub async fn retry_due(&self) -> UseCaseResult<usize> {
        let now = Utc::now();
        let candidates = self
            .log_repository
            .list_retryable(self.max_attempts, now, RETRY_BATCH_SIZE)
            .await?;

        let mut attempted = 0;
        for log in candidates {
            let Some(qr_code) = self.qr_code_repository.find_by_id(log.qr_code_id).await? else {
                continue;
            };

            let log_id = log.id;
            match self.redeliver(&qr_code, log).await {
                Ok(_) => attempted += 1,
                Err(err) => warn!(%log_id, error = ?err, "webhook_outbox: scheduled retry failed"),
            }
        }
        Ok(attempted)
    }

    /// Redelivers to the QR code's current endpoint, signed with its current secret.
    async fn redeliver(
        &self,
        qr_code: &QrCodeEntity,
        log: WebhookLogEntity,
    ) -> UseCaseResult<(WebhookLogEntity, DeliveryOutcome)> {
        let url = qr_code
            .webhook_url
            .clone()
            .ok_or(WebhookError::NotConfigured(qr_code.id))?;
        let body = serde_json::to_string(&log.payload).map_err(anyhow::Error::from)?;
        let log = self
            .log_repository
            .begin_retry(log.id, url.clone(), Utc::now())
            .await?;
        let outcome = self
            .post(&log, &url, &body, qr_code.webhook_secret.as_deref())
            .await?;
        Ok((log, outcome))
    }

    async fn post(
        &self,
        log: &WebhookLogEntity,
        url: &str,
        body: &str,
        secret: Option<&str>,
    ) -> UseCaseResult<DeliveryOutcome> {
        let signature = secret
            .map(|secret| sign_payload(secret, body.as_bytes()))
            .transpose()?;

        let outcome = self
            .dispatcher
            .deliver(url, body, signature)
            .await;

        if outcome.is_successful {
            info!(log_id = %log.id, qr_code_id = %log.qr_code_id, status = ?outcome.response_status, "webhook_outbox: delivered");
        } else {
            warn!(
                log_id = %log.id,
                qr_code_id = %log.qr_code_id,
                attempts = log.attempts,
                status = ?outcome.response_status,
                "webhook_outbox: delivery failed"
            );
        }

        self.log_repository
            .record_outcome(log.id, outcome.clone())
            .await
            .map_err(|err| {
                error!(log_id = %log.id, db_error = ?err, "webhook_outbox: failed to record outcome");
                err
            })?;
        Ok(outcome)
    }

    async fn accessible_qr_code(
        &self,
        principal: &ApiKeyPrincipal,
        qr_code_id: Uuid,
    ) -> UseCaseResult<QrCodeEntity> {
        let qr_code = self
            .qr_code_repository
            .find_by_id(qr_code_id)
            .await?
            .ok_or(WebhookError::QrCodeNotFound(qr_code_id))?;
        if !self.access.principal_can_access(principal, &qr_code).await? {
            return Err(WebhookError::Forbidden);
        }
        Ok(qr_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{access::tests::sample_qr, entitlements::tests::entitlements_with};
    use crates::{
        domain::repositories::{
            organizations::MockOrganizationRepository, qr_codes::MockQrCodeRepository,
            webhook_dispatcher::MockWebhookDispatcher, webhook_logs::MockWebhookLogRepository,
        },
        infra::security::signatures::verify_signature,
    };
    use mockall::Sequence;
    use serde_json::json;

    fn principal(user_id: Uuid) -> ApiKeyPrincipal {
        ApiKeyPrincipal {
            key_id: Uuid::new_v4(),
            user_id: Some(user_id),
            organization_id: None,
            scopes: vec!["*".to_string()],
        }
    }

    fn log_entity(insert: InsertWebhookLogEntity) -> WebhookLogEntity {
        WebhookLogEntity {
            id: Uuid::new_v4(),
            qr_code_id: insert.qr_code_id,
            webhook_url: insert.webhook_url,
            payload: insert.payload,
            response_status: None,
            response_body: None,
            is_successful: insert.is_successful,
            attempts: insert.attempts,
            last_attempt_at: insert.last_attempt_at,
            created_at: insert.last_attempt_at,
        }
    }

    fn outbox(
        user_id: Uuid,
        plan: &'static str,
        qr_codes: MockQrCodeRepository,
        logs: MockWebhookLogRepository,
        dispatcher: MockWebhookDispatcher,
    ) -> WebhookOutboxUseCase {
        let mut organizations = MockOrganizationRepository::new();
        organizations.expect_list_member_ids().returning(|_| Ok(Vec::new()));
        WebhookOutboxUseCase::new(
            Arc::new(qr_codes),
            Arc::new(logs),
            Arc::new(dispatcher),
            Arc::new(entitlements_with(user_id, plan, 0, 0)),
            Arc::new(AccessPolicy::new(Arc::new(organizations))),
            5,
        )
    }

    fn scan_job(secret: Option<&str>) -> ScanWebhookJob {
        let qr_code_id = Uuid::new_v4();
        ScanWebhookJob {
            qr_code_id,
            webhook_url: "https://hooks.example.com/scan".to_string(),
            secret: secret.map(str::to_string),
            payload: ScanWebhookPayload {
                qr_code_id,
                scan_id: Uuid::new_v4(),
                user_agent: Some("curl/8".to_string()),
                device: Some("desktop".to_string()),
                country: Some("IN".to_string()),
                city: None,
                redirect_url: "https://example.com".to_string(),
                ab_test_variant: None,
                timestamp: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn log_row_is_written_before_the_post() {
        let mut seq = Sequence::new();
        let mut logs = MockWebhookLogRepository::new();
        let mut dispatcher = MockWebhookDispatcher::new();

        logs.expect_create_attempt()
            .withf(|insert| insert.attempts == 1 && !insert.is_successful)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|insert| Ok(log_entity(insert)));
        dispatcher
            .expect_deliver()
            .withf(|url, body, signature| {
                url == "https://hooks.example.com/scan"
                    && signature
                        .as_deref()
                        .is_some_and(|sig| verify_signature("whsec", body.as_bytes(), sig))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| DeliveryOutcome::from_response(200, "ok"));
        logs.expect_record_outcome()
            .withf(|_, outcome| outcome.is_successful)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let usecase = outbox(Uuid::new_v4(), "PRO", MockQrCodeRepository::new(), logs, dispatcher);
        let outcome = usecase.deliver_scan(scan_job(Some("whsec"))).await.unwrap();
        assert!(outcome.is_successful);
    }

    #[tokio::test]
    async fn unsigned_when_no_secret_is_configured() {
        let mut logs = MockWebhookLogRepository::new();
        logs.expect_create_attempt().returning(|insert| Ok(log_entity(insert)));
        logs.expect_record_outcome()
            .withf(|_, outcome| !outcome.is_successful && outcome.response_status.is_none())
            .returning(|_, _| Ok(()));
        let mut dispatcher = MockWebhookDispatcher::new();
        dispatcher
            .expect_deliver()
            .withf(|_, _, signature| signature.is_none())
            .returning(|_, _, _| DeliveryOutcome::from_transport_error("connection refused"));

        let usecase = outbox(Uuid::new_v4(), "PRO", MockQrCodeRepository::new(), logs, dispatcher);
        assert!(!usecase.deliver_scan(scan_job(None)).await.unwrap().is_successful);
    }

    #[tokio::test]
    async fn configure_requires_the_webhooks_feature() {
        let user_id = Uuid::new_v4();
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes
            .expect_find_by_id()
            .returning(move |id| Ok(Some(sample_qr(id, user_id, None))));
        qr_codes.expect_set_webhook().never();

        let usecase = outbox(user_id, "FLEX", qr_codes, MockWebhookLogRepository::new(), MockWebhookDispatcher::new());
        let model = ConfigureWebhookModel {
            qr_code_id: Some(Uuid::new_v4()),
            webhook_url: Some("https://hooks.example.com".to_string()),
            regenerate_secret: false,
        };
        assert!(matches!(
            usecase.configure(&principal(user_id), model).await,
            Err(WebhookError::Entitlement(EntitlementError::FeatureNotAllowed { .. }))
        ));
    }

    #[tokio::test]
    async fn configure_generates_a_secret_only_when_missing_or_requested() {
        let user_id = Uuid::new_v4();
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes.expect_find_by_id().returning(move |id| {
            let mut qr_code = sample_qr(id, user_id, None);
            qr_code.webhook_secret = Some("existing".to_string());
            Ok(Some(qr_code))
        });
        qr_codes
            .expect_set_webhook()
            .returning(move |id, url, _| {
                let mut qr_code = sample_qr(id, user_id, None);
                qr_code.webhook_url = Some(url);
                Ok(qr_code)
            });

        let usecase = outbox(user_id, "PRO", qr_codes, MockWebhookLogRepository::new(), MockWebhookDispatcher::new());
        let model = |regenerate_secret| ConfigureWebhookModel {
            qr_code_id: Some(Uuid::new_v4()),
            webhook_url: Some("https://hooks.example.com".to_string()),
            regenerate_secret,
        };

        let kept = usecase.configure(&principal(user_id), model(false)).await.unwrap();
        assert!(kept.secret.is_none());

        let rotated = usecase.configure(&principal(user_id), model(true)).await.unwrap();
        assert_eq!(rotated.secret.map(|s| s.len()), Some(64));
    }

    #[tokio::test]
    async fn cross_tenant_access_is_forbidden() {
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes
            .expect_find_by_id()
            .returning(|id| Ok(Some(sample_qr(id, Uuid::new_v4(), None))));

        let user_id = Uuid::new_v4();
        let usecase = outbox(user_id, "PRO", qr_codes, MockWebhookLogRepository::new(), MockWebhookDispatcher::new());
        assert!(matches!(
            usecase.remove(&principal(user_id), Some(Uuid::new_v4())).await,
            Err(WebhookError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn manual_retry_bumps_attempts_before_delivering() {
        let user_id = Uuid::new_v4();
        let qr_code_id = Uuid::new_v4();
        let log_id = Uuid::new_v4();
        let stored = WebhookLogEntity {
            id: log_id,
            qr_code_id,
            webhook_url: "https://hooks.example.com/scan".to_string(),
            payload: json!({ "scanId": "abc" }),
            response_status: Some(500),
            response_body: Some("boom".to_string()),
            is_successful: false,
            attempts: 1,
            last_attempt_at: Utc::now(),
            created_at: Utc::now(),
        };

        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes.expect_find_by_id().returning(move |id| {
            let mut qr_code = sample_qr(id, user_id, None);
            qr_code.webhook_url = Some("https://hooks.example.com/scan".to_string());
            qr_code.webhook_secret = Some("whsec".to_string());
            Ok(Some(qr_code))
        });

        let mut seq = Sequence::new();
        let mut logs = MockWebhookLogRepository::new();
        let found = stored.clone();
        logs.expect_find_by_id()
            .returning(move |_| Ok(Some(found.clone())));
        let bumped = WebhookLogEntity {
            attempts: 2,
            ..stored.clone()
        };
        logs.expect_begin_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _| Ok(bumped.clone()));
        let mut dispatcher = MockWebhookDispatcher::new();
        dispatcher
            .expect_deliver()
            .withf(|_, body, signature| body == r#"{"scanId":"abc"}"# && signature.is_some())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| DeliveryOutcome::from_response(204, ""));
        logs.expect_record_outcome()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let usecase = outbox(user_id, "PRO", qr_codes, logs, dispatcher);
        let retried = usecase
            .retry(&principal(user_id), qr_code_id, Some(log_id))
            .await
            .unwrap();

        assert_eq!(retried.attempts, 2);
        assert!(retried.is_successful);
        assert_eq!(retried.response_status, Some(204));
    }

    #[tokio::test]
    async fn log_pages_report_has_more() {
        let user_id = Uuid::new_v4();
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes
            .expect_find_by_id()
            .returning(move |id| Ok(Some(sample_qr(id, user_id, None))));
        let mut logs = MockWebhookLogRepository::new();
        logs.expect_list_for_qr_code()
            .withf(|_, status, limit, offset| status.is_none() && *limit == 50 && *offset == 0)
            .returning(|_, _, _, _| Ok((Vec::new(), 120)));

        let usecase = outbox(user_id, "PRO", qr_codes, logs, MockWebhookDispatcher::new());
        let page = usecase
            .list_logs(&principal(user_id), Uuid::new_v4(), WebhookLogsQuery::default())
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 120);
        assert!(page.pagination.has_more);
    }

    #[tokio::test]
    async fn retry_sweep_posts_to_the_current_endpoint_with_the_current_secret() {
        let user_id = Uuid::new_v4();
        let qr_code_id = Uuid::new_v4();
        let stored = WebhookLogEntity {
            id: Uuid::new_v4(),
            qr_code_id,
            webhook_url: "https://old.example.com/hook".to_string(),
            payload: json!({ "scanId": "abc" }),
            response_status: Some(502),
            response_body: None,
            is_successful: false,
            attempts: 2,
            last_attempt_at: Utc::now() - chrono::Duration::hours(1),
            created_at: Utc::now() - chrono::Duration::hours(2),
        };

        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes.expect_find_by_id().returning(move |id| {
            let mut qr_code = sample_qr(id, user_id, None);
            qr_code.webhook_url = Some("https://new.example.com/hook".to_string());
            qr_code.webhook_secret = Some("whsec-rotated".to_string());
            Ok(Some(qr_code))
        });

        let started = Utc::now();
        let mut logs = MockWebhookLogRepository::new();
        let candidate = stored.clone();
        logs.expect_list_retryable()
            .withf(move |max_attempts, now, limit| {
                *max_attempts == 5 && *now >= started && *limit == RETRY_BATCH_SIZE
            })
            .times(1)
            .returning(move |_, _, _| Ok(vec![candidate.clone()]));
        logs.expect_begin_retry()
            .withf(|_, url, _| url == "https://new.example.com/hook")
            .times(1)
            .returning(move |_, url, attempted_at| {
                Ok(WebhookLogEntity {
                    webhook_url: url,
                    attempts: 3,
                    last_attempt_at: attempted_at,
                    ..stored.clone()
                })
            });
        logs.expect_record_outcome().times(1).returning(|_, _| Ok(()));

        let mut dispatcher = MockWebhookDispatcher::new();
        dispatcher
            .expect_deliver()
            .withf(|url, body, signature| {
                url == "https://new.example.com/hook"
                    && signature
                        .as_deref()
                        .is_some_and(|sig| verify_signature("whsec-rotated", body.as_bytes(), sig))
            })
            .times(1)
            .returning(|_, _, _| DeliveryOutcome::from_response(200, "ok"));

        let usecase = outbox(user_id, "PRO", qr_codes, logs, dispatcher);
        assert_eq!(usecase.retry_due().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn manual_retry_without_a_webhook_is_rejected() {
        let user_id = Uuid::new_v4();
        let qr_code_id = Uuid::new_v4();
        let log_id = Uuid::new_v4();

        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes
            .expect_find_by_id()
            .returning(move |id| Ok(Some(sample_qr(id, user_id, None))));
        let mut logs = MockWebhookLogRepository::new();
        logs.expect_find_by_id().returning(move |_| {
            Ok(Some(WebhookLogEntity {
                id: log_id,
                qr_code_id,
                webhook_url: "https://old.example.com/hook".to_string(),
                payload: json!({}),
                response_status: None,
                response_body: None,
                is_successful: false,
                attempts: 1,
                last_attempt_at: Utc::now(),
                created_at: Utc::now(),
            }))
        });
        logs.expect_begin_retry().never();

        let usecase = outbox(user_id, "PRO", qr_codes, logs, MockWebhookDispatcher::new());
        assert!(matches!(
            usecase.retry(&principal(user_id), qr_code_id, Some(log_id)).await,
            Err(WebhookError::NotConfigured(id)) if id == qr_code_id
        ));
    }
}
