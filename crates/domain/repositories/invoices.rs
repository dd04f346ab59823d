use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::invoices::InsertInvoiceEntity;

#[automock]
#[async_trait]
pub trait InvoiceRepository {
    /// Upserts on `(gateway, gateway_invoice_id)`.
    async fn create_invoice(&self, invoice: InsertInvoiceEntity) -> Result<Uuid>;
}
