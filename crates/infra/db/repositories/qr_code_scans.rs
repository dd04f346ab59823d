use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{qr_code_scans, qr_codes},
    },
};
use domain::{
    entities::qr_code_scans::{InsertQrCodeScanEntity, QrCodeScanEntity},
    repositories::qr_code_scans::QrCodeScanRepository,
};

pub struct QrCodeScanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl QrCodeScanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl QrCodeScanRepository for QrCodeScanPostgres {
    async fn record_scan(&self, scan: InsertQrCodeScanEntity) -> Result<Option<QrCodeScanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            // The counter only moves while it is below max_scans.
            let bumped = update(
                qr_codes::table
                    .filter(qr_codes::id.eq(scan.qr_code_id))
                    .filter(
                        qr_codes::max_scans
                            .is_null()
                            .or(qr_codes::scan_count.lt(qr_codes::max_scans.assume_not_null())),
                    ),
            )
            .set((
                qr_codes::scan_count.eq(qr_codes::scan_count + 1),
                qr_codes::last_scanned_at.eq(Some(scan.scanned_at)),
            ))
            .execute(conn)?;

            if bumped == 0 {
                return Ok(None);
            }

            let recorded = insert_into(qr_code_scans::table)
                .values(&scan)
                .returning(QrCodeScanEntity::as_returning())
                .get_result::<QrCodeScanEntity>(conn)?;

            Ok(Some(recorded))
        })
    }

    async fn list_by_qr_code(&self, qr_code_id: Uuid) -> Result<Vec<QrCodeScanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = qr_code_scans::table
            .filter(qr_code_scans::qr_code_id.eq(qr_code_id))
            .order(qr_code_scans::scanned_at.desc())
            .select(QrCodeScanEntity::as_select())
            .load::<QrCodeScanEntity>(&mut conn)?;

        Ok(results)
    }

    async fn count_for_owner_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = qr_code_scans::table
            .inner_join(qr_codes::table)
            .filter(qr_codes::user_id.eq(user_id))
            .filter(qr_code_scans::scanned_at.ge(since))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(total)
    }
}
