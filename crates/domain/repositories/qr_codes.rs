use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::qr_codes::{InsertQrCodeEntity, QrCodeEntity, UpdateQrCodeEntity},
    value_objects::credits::CreditTransactionError,
};

#[automock]
#[async_trait]
pub trait QrCodeRepository {
    /// Locks the owner's row, debits one credit and inserts the QR code, all or nothing.
    async fn create_with_credit_deduction(
        &self,
        user_id: Uuid,
        qr_code: InsertQrCodeEntity,
    ) -> std::result::Result<QrCodeEntity, CreditTransactionError>;

    /// Same as `create_with_credit_deduction` for N rows and N credits.
    async fn bulk_create_with_credits(
        &self,
        user_id: Uuid,
        qr_codes: Vec<InsertQrCodeEntity>,
    ) -> std::result::Result<Vec<QrCodeEntity>, CreditTransactionError>;

    async fn find_by_id(&self, qr_code_id: Uuid) -> Result<Option<QrCodeEntity>>;
    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<QrCodeEntity>>;
    async fn count_by_user(&self, user_id: Uuid) -> Result<i64>;
    async fn update(&self, qr_code_id: Uuid, changes: UpdateQrCodeEntity) -> Result<QrCodeEntity>;
    async fn delete(&self, qr_code_id: Uuid) -> Result<bool>;

    /// Sets the webhook url; `secret: None` keeps the stored secret.
    async fn set_webhook(
        &self,
        qr_code_id: Uuid,
        webhook_url: String,
        secret: Option<String>,
    ) -> Result<QrCodeEntity>;
    async fn clear_webhook(&self, qr_code_id: Uuid) -> Result<()>;
    /// QR codes with a webhook configured, owned by any of `owner_ids`.
    async fn list_webhook_configs(&self, owner_ids: Vec<Uuid>) -> Result<Vec<QrCodeEntity>>;
}
