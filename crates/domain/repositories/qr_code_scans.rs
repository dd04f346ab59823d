use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::qr_code_scans::{InsertQrCodeScanEntity, QrCodeScanEntity};

#[automock]
#[async_trait]
pub trait QrCodeScanRepository {
    /// Inserts the scan and bumps `scan_count` in one transaction.
    ///
    /// Returns `None` and writes nothing when the QR code already reached
    /// `max_scans`.
    async fn record_scan(&self, scan: InsertQrCodeScanEntity) -> Result<Option<QrCodeScanEntity>>;
    async fn list_by_qr_code(&self, qr_code_id: Uuid) -> Result<Vec<QrCodeScanEntity>>;
    /// Scans across every QR code owned by `user_id` since `since`.
    async fn count_for_owner_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i64>;
}
