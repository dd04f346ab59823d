use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::{bulk_groups::InsertBulkGroupEntity, qr_codes::QrCodeEntity},
        repositories::{
            bulk_groups::BulkGroupRepository, cache::CacheStore, qr_code_scans::QrCodeScanRepository,
            qr_codes::QrCodeRepository,
        },
        value_objects::{
            bulk::{
                BULK_GROUP_HISTORY_LIMIT, BulkExportDto, BulkGroupDto, BulkOperationModel,
                BulkResults, BulkRunDto, item_id, parse_create_items, parse_update_item,
            },
            credits::CreditTransactionError,
            enums::{bulk_group_statuses::BulkGroupStatus, bulk_operations::BulkOperation},
            plans::Feature,
            qr_codes::{CreateQrCodeModel, QrCodeDto},
            rate_limits::RateLimitPolicy,
            scans::aggregate_scans,
            validation::FieldError,
        },
    },
    infra::cache::{keys, typed},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    access::AccessPolicy,
    entitlements::{EntitlementError, EntitlementsUseCase},
    qr_codes::{creation_gates, owner_cache_keys},
    rate_limiter::{RateLimitError, RateLimiter},
};

#[derive(Debug, Error)]
pub enum BulkError {
    #[error(transparent)]
    Validation(FieldError),
    #[error("bulk group {0} not found")]
    GroupNotFound(Uuid),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error(transparent)]
    Credits(#[from] CreditTransactionError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<FieldError> for BulkError {
    fn from(err: FieldError) -> Self {
        BulkError::Validation(err)
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BulkError>;

/// Bulk create is one all-or-nothing transaction. Update, delete and export
/// run item by item and report per-item failures.
pub struct BulkUseCase {
    qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
    bulk_group_repository: Arc<dyn BulkGroupRepository + Send + Sync>,
    scan_repository: Arc<dyn QrCodeScanRepository + Send + Sync>,
    entitlements: Arc<EntitlementsUseCase>,
    access: Arc<AccessPolicy>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<dyn CacheStore>,
}

impl BulkUseCase {
    pub fn new(
        qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
        bulk_group_repository: Arc<dyn BulkGroupRepository + Send + Sync>,
        scan_repository: Arc<dyn QrCodeScanRepository + Send + Sync>,
        entitlements: Arc<EntitlementsUseCase>,
        access: Arc<AccessPolicy>,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            qr_code_repository,
            bulk_group_repository,
            scan_repository,
            entitlements,
            access,
            rate_limiter,
            cache,
        }
    }

    pub async fn run(&self, user_id: Uuid, model: BulkOperationModel) -> UseCaseResult<BulkRunDto> {
        let operation = model.validate()?;
        let create_items = match operation {
            BulkOperation::Create => Some(parse_create_items(&model.qr_codes)?),
            _ => None,
        };

        self.rate_limiter
            .enforce(&format!("user:{user_id}"), &RateLimitPolicy::qr_bulk())
            .await?;

        let now = Utc::now();
        let group = self
            .bulk_group_repository
            .create(InsertBulkGroupEntity {
                user_id,
                group_name: model.group_name_or_default(operation, now),
                operation_type: operation.to_string(),
                total_count: model.qr_codes.len() as i32,
                status: BulkGroupStatus::Processing.to_string(),
            })
            .await?;

        info!(%user_id, bulk_group_id = %group.id, %operation, total = model.qr_codes.len(), "bulk: started");

        let outcome = match create_items {
            Some(items) => self.create_all(user_id, items).await,
            None => Ok(self.per_item(user_id, operation, &model.qr_codes).await),
        };

        let results = match outcome {
            Ok(results) => results,
            Err(err) => {
                let failed = model.qr_codes.len() as i32;
                let summary = json!({ "error": err.to_string() });
                self.finish(group.id, BulkGroupStatus::Failed, 0, failed, summary).await;
                warn!(%user_id, bulk_group_id = %group.id, error = %err, "bulk: create rolled back");
                return Err(err);
            }
        };

        let processed = results.processed_count();
        let failed = results.failed_count();
        let status = if processed == 0 && failed > 0 {
            BulkGroupStatus::Failed
        } else {
            BulkGroupStatus::Completed
        };
        let results_json = serde_json::to_value(&results).unwrap_or(Value::Null);
        self.finish(group.id, status, processed, failed, results_json).await;

        typed::invalidate(self.cache.as_ref(), &owner_cache_keys(user_id)).await;
        info!(%user_id, bulk_group_id = %group.id, processed, failed, "bulk: finished");

        Ok(BulkRunDto {
            bulk_group_id: group.id,
            operation,
            processed,
            failed,
            results,
        })
    }

    pub async fn list_groups(&self, user_id: Uuid) -> UseCaseResult<Vec<BulkGroupDto>> {
        let groups = self
            .bulk_group_repository
            .list_for_user(user_id, BULK_GROUP_HISTORY_LIMIT)
            .await?;
        Ok(groups.into_iter().map(BulkGroupDto::from).collect())
    }

    pub async fn get_group(&self, user_id: Uuid, bulk_group_id: Uuid) -> UseCaseResult<BulkGroupDto> {
        self.bulk_group_repository
            .find_for_user(bulk_group_id, user_id)
            .await?
            .map(BulkGroupDto::from)
            .ok_or(BulkError::GroupNotFound(bulk_group_id))
    }

    async fn create_all(
        &self,
        user_id: Uuid,
        items: Vec<CreateQrCodeModel>,
    ) -> UseCaseResult<BulkResults> {
        let plan = self
            .entitlements
            .assert_can_create_qr(user_id, items.len() as i64)
            .await?;

        let mut inserts = Vec::with_capacity(items.len());
        for item in items {
            if let Some(organization_id) = item.organization_id {
                if !self.access.is_member(organization_id, user_id).await? {
                    return Err(FieldError::invalid_format(
                        "organizationId",
                        "You are not a member of this organization",
                    )
                    .into());
                }
            }
            let has_watermark = creation_gates(plan, &item)?;
            inserts.push(item.into_insert_entity(Uuid::new_v4(), user_id, has_watermark));
        }

        let created = self
            .qr_code_repository
            .bulk_create_with_credits(user_id, inserts)
            .await?;

        let mut results = BulkResults::default();
        for qr_code in created {
            results.record_success(to_json(QrCodeDto::from(qr_code)));
        }
        Ok(results)
    }

    async fn per_item(&self, user_id: Uuid, operation: BulkOperation, items: &[Value]) -> BulkResults {
        let mut results = BulkResults::default();
        for item in items {
            match self.apply_one(user_id, operation, item).await {
                Ok(result) => results.record_success(result),
                Err(message) => results.record_failure(item.clone(), message),
            }
        }
        results
    }

    async fn apply_one(&self, user_id: Uuid, operation: BulkOperation, item: &Value) -> Result<Value, String> {
        let qr_code_id = item_id(item)?;
        let qr_code = self.load_for(user_id, qr_code_id, operation).await?;

        match operation {
            BulkOperation::Update => {
                let (_, changes) = parse_update_item(item)?;
                if changes.has_logo() {
                    self.entitlements
                        .assert_feature(qr_code.user_id, Feature::Logo)
                        .await
                        .map_err(|err| err.to_string())?;
                }
                let updated = self
                    .qr_code_repository
                    .update(qr_code_id, changes.into_changeset(Utc::now()))
                    .await
                    .map_err(|err| self.item_failure(qr_code_id, err))?;
                self.forget(&updated).await;
                Ok(to_json(QrCodeDto::from(updated)))
            }
            BulkOperation::Delete => {
                let deleted = self
                    .qr_code_repository
                    .delete(qr_code_id)
                    .await
                    .map_err(|err| self.item_failure(qr_code_id, err))?;
                if !deleted {
                    return Err("QR code not found".to_string());
                }
                self.forget(&qr_code).await;
                Ok(json!({ "id": qr_code_id, "deleted": true }))
            }
            BulkOperation::Export => {
                let scans = self
                    .scan_repository
                    .list_by_qr_code(qr_code_id)
                    .await
                    .map_err(|err| self.item_failure(qr_code_id, err))?;
                Ok(to_json(BulkExportDto {
                    analytics: aggregate_scans(&scans),
                    qr_code: QrCodeDto::from(qr_code),
                    export_date: Utc::now(),
                }))
            }
            BulkOperation::Create => Err("create items are not processed one by one".to_string()),
        }
    }

    async fn load_for(
        &self,
        user_id: Uuid,
        qr_code_id: Uuid,
        operation: BulkOperation,
    ) -> Result<QrCodeEntity, String> {
        let qr_code = self
            .qr_code_repository
            .find_by_id(qr_code_id)
            .await
            .map_err(|err| self.item_failure(qr_code_id, err))?
            .ok_or_else(|| "QR code not found".to_string())?;

        let allowed = match operation {
            BulkOperation::Export => self.access.can_view(user_id, &qr_code).await,
            _ => self.access.can_manage(user_id, &qr_code).await,
        }
        .map_err(|err| self.item_failure(qr_code_id, err))?;

        if !allowed {
            return Err("You do not have access to this QR code".to_string());
        }
        Ok(qr_code)
    }

    fn item_failure(&self, qr_code_id: Uuid, err: anyhow::Error) -> String {
        error!(%qr_code_id, db_error = ?err, "bulk: item failed");
        "Database operation failed".to_string()
    }

    async fn forget(&self, qr_code: &QrCodeEntity) {
        let mut stale = owner_cache_keys(qr_code.user_id);
        stale.push(keys::qr_code(qr_code.id));
        stale.push(keys::scan_stats(qr_code.id));
        typed::invalidate(self.cache.as_ref(), &stale).await;
    }

    async fn finish(&self, bulk_group_id: Uuid, status: BulkGroupStatus, processed: i32, failed: i32, results: Value) {
        if let Err(err) = self
            .bulk_group_repository
            .finish(bulk_group_id, status, processed, failed, results, Utc::now())
            .await
        {
            error!(%bulk_group_id, db_error = ?err, "bulk: failed to record the group outcome");
        }
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        access::tests::sample_qr, entitlements::tests::entitlements_with,
        rate_limiter::tests::permissive_limiter,
    };
    use crates::{
        domain::{
            entities::bulk_groups::BulkGroupEntity,
            repositories::{
                bulk_groups::MockBulkGroupRepository, organizations::MockOrganizationRepository,
                qr_code_scans::MockQrCodeScanRepository, qr_codes::MockQrCodeRepository,
            },
        },
        infra::cache::memory_cache::MemoryCache,
    };

    fn group_entity(insert: InsertBulkGroupEntity) -> BulkGroupEntity {
        BulkGroupEntity {
            id: Uuid::new_v4(),
            user_id: insert.user_id,
            group_name: insert.group_name,
            operation_type: insert.operation_type,
            total_count: insert.total_count,
            processed_count: 0,
            failed_count: 0,
            status: insert.status,
            results: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn groups_expecting(status: BulkGroupStatus, processed: i32, failed: i32) -> MockBulkGroupRepository {
        let mut groups = MockBulkGroupRepository::new();
        groups
            .expect_create()
            .times(1)
            .returning(|insert| Ok(group_entity(insert)));
        groups
            .expect_finish()
            .withf(move |_, s, p, f, _, _| *s == status && *p == processed && *f == failed)
            .times(1)
            .returning(|_, _, _, _, _, _| Ok(()));
        groups
    }

    fn usecase(
        user_id: Uuid,
        qr_codes: MockQrCodeRepository,
        groups: MockBulkGroupRepository,
        qr_count: i64,
    ) -> BulkUseCase {
        let mut organizations = MockOrganizationRepository::new();
        organizations
            .expect_find_member_role()
            .returning(|_, _| Ok(None));
        let mut scans = MockQrCodeScanRepository::new();
        scans.expect_list_by_qr_code().returning(|_| Ok(Vec::new()));

        BulkUseCase::new(
            Arc::new(qr_codes),
            Arc::new(groups),
            Arc::new(scans),
            Arc::new(entitlements_with(user_id, "PRO", qr_count, 0)),
            Arc::new(AccessPolicy::new(Arc::new(organizations))),
            Arc::new(permissive_limiter()),
            Arc::new(MemoryCache::new()),
        )
    }

    fn model(operation: BulkOperation, qr_codes: Vec<Value>) -> BulkOperationModel {
        BulkOperationModel {
            operation: Some(operation),
            qr_codes,
            group_name: None,
        }
    }

    #[tokio::test]
    async fn create_runs_as_one_transaction() {
        let user_id = Uuid::new_v4();
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes
            .expect_bulk_create_with_credits()
            .withf(|_, inserts| inserts.len() == 3)
            .times(1)
            .returning(|_, inserts| {
                Ok(inserts
                    .into_iter()
                    .map(|insert| sample_qr(insert.id, insert.user_id, None))
                    .collect())
            });

        let usecase = usecase(user_id, qr_codes, groups_expecting(BulkGroupStatus::Completed, 3, 0), 0);
        let items = (0..3)
            .map(|i| json!({ "url": format!("https://example.com/{i}") }))
            .collect();
        let run = usecase.run(user_id, model(BulkOperation::Create, items)).await.unwrap();

        assert_eq!(run.processed, 3);
        assert_eq!(run.failed, 0);
    }

    #[tokio::test]
    async fn short_on_credits_rolls_back_everything() {
        let user_id = Uuid::new_v4();
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes.expect_bulk_create_with_credits().returning(|_, _| {
            Err(CreditTransactionError::InsufficientCredits {
                required: 2,
                available: 1,
            })
        });

        let usecase = usecase(user_id, qr_codes, groups_expecting(BulkGroupStatus::Failed, 0, 2), 0);
        let items = vec![
            json!({ "url": "https://example.com/a" }),
            json!({ "url": "https://example.com/b" }),
        ];
        let err = usecase.run(user_id, model(BulkOperation::Create, items)).await.unwrap_err();
        assert!(matches!(
            err,
            BulkError::Credits(CreditTransactionError::InsufficientCredits {
                required: 2,
                available: 1
            })
        ));
    }

    #[tokio::test]
    async fn one_invalid_create_item_rejects_the_batch_up_front() {
        let user_id = Uuid::new_v4();
        let mut groups = MockBulkGroupRepository::new();
        groups.expect_create().never();

        let usecase = usecase(user_id, MockQrCodeRepository::new(), groups, 0);
        let items = vec![json!({ "url": "https://example.com" }), json!({ "title": "no url" })];
        match usecase.run(user_id, model(BulkOperation::Create, items)).await.unwrap_err() {
            BulkError::Validation(field_error) => assert_eq!(field_error.field, "qrCodes[1].url"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_collects_per_item_failures() {
        let user_id = Uuid::new_v4();
        let owned = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes.expect_find_by_id().returning(move |id| {
            let owner = if id == owned { user_id } else { Uuid::new_v4() };
            Ok(Some(sample_qr(id, owner, None)))
        });
        qr_codes
            .expect_delete()
            .withf(move |id| *id == owned)
            .times(1)
            .returning(|_| Ok(true));

        let usecase = usecase(user_id, qr_codes, groups_expecting(BulkGroupStatus::Completed, 1, 2), 0);
        let items = vec![
            json!({ "id": owned.to_string() }),
            json!({ "id": foreign.to_string() }),
            json!({ "title": "missing id" }),
        ];
        let run = usecase.run(user_id, model(BulkOperation::Delete, items)).await.unwrap();

        assert_eq!(run.processed, 1);
        assert_eq!(run.failed, 2);
        assert_eq!(run.results.errors[0].error, "You do not have access to this QR code");
        assert_eq!(run.results.errors[1].error, "QR code id is required for this operation");
    }

    #[tokio::test]
    async fn export_bundles_analytics() {
        let user_id = Uuid::new_v4();
        let qr_code_id = Uuid::new_v4();
        let mut qr_codes = MockQrCodeRepository::new();
        qr_codes
            .expect_find_by_id()
            .returning(move |id| Ok(Some(sample_qr(id, user_id, None))));

        let usecase = usecase(user_id, qr_codes, groups_expecting(BulkGroupStatus::Completed, 1, 0), 0);
        let run = usecase
            .run(user_id, model(BulkOperation::Export, vec![json!({ "id": qr_code_id.to_string() })]))
            .await
            .unwrap();

        let exported = &run.results.successful[0];
        assert_eq!(exported["id"], json!(qr_code_id.to_string()));
        assert_eq!(exported["analytics"]["totalScans"], json!(0));
        assert!(exported.get("exportDate").is_some());
    }

    #[tokio::test]
    async fn groups_of_other_users_are_not_found() {
        let mut groups = MockBulkGroupRepository::new();
        groups.expect_find_for_user().returning(|_, _| Ok(None));

        let user_id = Uuid::new_v4();
        let usecase = usecase(user_id, MockQrCodeRepository::new(), groups, 0);
        assert!(matches!(
            usecase.get_group(user_id, Uuid::new_v4()).await,
            Err(BulkError::GroupNotFound(_))
        ));
    }
}
