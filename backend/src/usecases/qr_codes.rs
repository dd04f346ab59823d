use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::qr_codes::QrCodeEntity,
        repositories::{cache::CacheStore, qr_codes::QrCodeRepository},
        value_objects::{
            credits::CreditTransactionError,
            enums::plan_names::PlanName,
            plans::{Feature, has_feature},
            qr_codes::{
                CreateQrCodeModel, DEFAULT_PAGE_SIZE, PageQuery, QrCodeDto, QrCodeListDto,
                UpdateQrCodeModel,
            },
            rate_limits::RateLimitPolicy,
            validation::FieldError,
        },
    },
    infra::cache::{keys, typed},
};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use super::{
    access::AccessPolicy,
    entitlements::{EntitlementError, EntitlementsUseCase, ensure_feature},
    rate_limiter::{RateLimitError, RateLimiter},
};

#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error(transparent)]
    Validation(FieldError),
    #[error("QR code {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error(transparent)]
    Credits(#[from] CreditTransactionError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<FieldError> for QrCodeError {
    fn from(err: FieldError) -> Self {
        QrCodeError::Validation(err)
    }
}

pub type UseCaseResult<T> = std::result::Result<T, QrCodeError>;

/// Applies the plan's feature gates to a create request and returns whether
/// the QR code keeps its watermark.
pub fn creation_gates(plan: PlanName, model: &CreateQrCodeModel) -> Result<bool, EntitlementError> {
    if model.is_dynamic {
        ensure_feature(plan, Feature::DynamicQr)?;
    }
    if model.has_logo() {
        ensure_feature(plan, Feature::Logo)?;
    }
    Ok(!has_feature(plan, Feature::RemoveWatermark))
}

/// Cache keys a write by `user_id` makes stale.
pub fn owner_cache_keys(user_id: Uuid) -> Vec<String> {
    let mut stale = vec![keys::user_credits(user_id)];
    stale.extend((1..=keys::INVALIDATED_LIST_PAGES).map(|page| keys::qr_code_list(user_id, page)));
    stale
}

pub struct QrCodesUseCase {
    qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
    entitlements: Arc<EntitlementsUseCase>,
    access: Arc<AccessPolicy>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<dyn CacheStore>,
}

impl QrCodesUseCase {
    pub fn new(
        qr_code_repository: Arc<dyn QrCodeRepository + Send + Sync>,
        entitlements: Arc<EntitlementsUseCase>,
        access: Arc<AccessPolicy>,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            qr_code_repository,
            entitlements,
            access,
            rate_limiter,
            cache,
        }
    }

    pub async fn create(&self, user_id: Uuid, model: CreateQrCodeModel) -> UseCaseResult<QrCodeDto> {
        model.validate()?;

        if let Some(organization_id) = model.organization_id {
            if !self.access.is_member(organization_id, user_id).await? {
                return Err(QrCodeError::Forbidden(
                    "You are not a member of this organization".to_string(),
                ));
            }
        }

        self.rate_limiter
            .enforce(&format!("user:{user_id}"), &RateLimitPolicy::qr_create())
            .await?;

        let plan = self.entitlements.assert_can_create_qr(user_id, 1).await?;
        let has_watermark = creation_gates(plan, &model)?;

        let insert = model.into_insert_entity(Uuid::new_v4(), user_id, has_watermark);
        let qr_code = self
            .qr_code_repository
            .create_with_credit_deduction(user_id, insert)
            .await
            .map_err(|err| {
                if let CreditTransactionError::TransactionFailed(source) = &err {
                    error!(%user_id, db_error = ?source, "qr_codes: create transaction failed");
                }
                err
            })?;

        typed::invalidate(self.cache.as_ref(), &owner_cache_keys(user_id)).await;
        info!(%user_id, qr_code_id = %qr_code.id, %plan, "qr_codes: created");

        Ok(qr_code.into())
    }

    pub async fn list(&self, user_id: Uuid, query: PageQuery) -> UseCaseResult<QrCodeListDto> {
        let page = query.page();
        let limit = query.limit();
        // Only default-sized pages are cached, so the key stays per page.
        let cache_key = (limit == DEFAULT_PAGE_SIZE).then(|| keys::qr_code_list(user_id, page));

        if let Some(cache_key) = &cache_key {
            if let Some(cached) = typed::get_json::<QrCodeListDto>(self.cache.as_ref(), cache_key).await {
                return Ok(cached);
            }
        }

        let qr_codes = self
            .qr_code_repository
            .list_by_user(user_id, limit, query.offset())
            .await?;
        let listed = QrCodeListDto {
            qr_codes: qr_codes.into_iter().map(QrCodeDto::from).collect(),
            page,
            limit,
        };

        if let Some(cache_key) = &cache_key {
            typed::set_json(self.cache.as_ref(), cache_key, &listed, keys::QR_LIST_TTL).await;
        }
        Ok(listed)
    }

    pub async fn get(&self, user_id: Uuid, qr_code_id: Uuid) -> UseCaseResult<QrCodeDto> {
        let qr_code = self.load_cached(qr_code_id).await?;
        if !self.access.can_view(user_id, &qr_code).await? {
            return Err(QrCodeError::Forbidden(
                "You do not have access to this QR code".to_string(),
            ));
        }
        Ok(qr_code.into())
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        qr_code_id: Uuid,
        model: UpdateQrCodeModel,
    ) -> UseCaseResult<QrCodeDto> {
        model.validate()?;

        let qr_code = self.load(qr_code_id).await?;
        if !self.access.can_manage(user_id, &qr_code).await? {
            return Err(QrCodeError::Forbidden(
                "Only the owner or an organization admin can update this QR code".to_string(),
            ));
        }
        if model.has_logo() {
            self.entitlements.assert_feature(qr_code.user_id, Feature::Logo).await?;
        }

        let updated = self
            .qr_code_repository
            .update(qr_code_id, model.into_changeset(Utc::now()))
            .await?;

        self.forget(&updated).await;
        info!(%user_id, %qr_code_id, "qr_codes: updated");
        Ok(updated.into())
    }

    pub async fn delete(&self, user_id: Uuid, qr_code_id: Uuid) -> UseCaseResult<()> {
        let qr_code = self.load(qr_code_id).await?;
        if !self.access.can_manage(user_id, &qr_code).await? {
            return Err(QrCodeError::Forbidden(
                "Only the owner or an organization admin can delete this QR code".to_string(),
            ));
        }

        if !self.qr_code_repository.delete(qr_code_id).await? {
            return Err(QrCodeError::NotFound(qr_code_id));
        }

        self.forget(&qr_code).await;
        info!(%user_id, %qr_code_id, "qr_codes: deleted");
        Ok(())
    }

    async fn load(&self, qr_code_id: Uuid) -> UseCaseResult<QrCodeEntity> {
        self.qr_code_repository
            .find_by_id(qr_code_id)
            .await?
            .ok_or(QrCodeError::NotFound(qr_code_id))
    }

    async fn load_cached(&self, qr_code_id: Uuid) -> UseCaseResult<QrCodeEntity> {
        let cache_key = keys::qr_code(qr_code_id);
        if let Some(cached) = typed::get_json::<QrCodeEntity>(self.cache.as_ref(), &cache_key).await {
            return Ok(cached);
        }
        let qr_code = self.load(qr_code_id).await?;
        typed::set_json(self.cache.as_ref(), &cache_key, &qr_code, keys::QR_CODE_TTL).await;
        Ok(qr_code)
    }

    async fn forget(&self, qr_code: &QrCodeEntity) {
        let mut stale = owner_cache_keys(qr_code.user_id);
        stale.push(keys::qr_code(qr_code.id));
        stale.push(keys::scan_stats(qr_code.id));
        typed::invalidate(self.cache.as_ref(), &stale).await;
    }
}
