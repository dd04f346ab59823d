use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{qr_codes, users},
    },
};
use domain::{
    entities::qr_codes::{InsertQrCodeEntity, QrCodeEntity, UpdateQrCodeEntity},
    repositories::qr_codes::QrCodeRepository,
    value_objects::credits::CreditTransactionError,
};

pub struct QrCodePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl QrCodePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Locks the user row for the rest of the transaction and checks the balance.
fn lock_and_check_credits(
    conn: &mut PgConnection,
    user_id: Uuid,
    required: i32,
) -> std::result::Result<(), CreditTransactionError> {
    let available = users::table
        .filter(users::id.eq(user_id))
        .select(users::credits)
        .for_update()
        .first::<i32>(conn)
        .optional()?
        .ok_or(CreditTransactionError::UserNotFound)?;

    if available < required {
        return Err(CreditTransactionError::InsufficientCredits {
            required,
            available,
        });
    }

    Ok(())
}

fn debit_credits(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i32,
) -> std::result::Result<(), CreditTransactionError> {
    update(users::table.filter(users::id.eq(user_id)))
        .set((
            users::credits.eq(users::credits - amount),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

#[async_trait]
impl QrCodeRepository for QrCodePostgres {
    async fn create_with_credit_deduction(
        &self,
        user_id: Uuid,
        qr_code: InsertQrCodeEntity,
    ) -> std::result::Result<QrCodeEntity, CreditTransactionError> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, CreditTransactionError, _>(|conn| {
            lock_and_check_credits(conn, user_id, 1)?;

            let created = insert_into(qr_codes::table)
                .values(&qr_code)
                .returning(QrCodeEntity::as_returning())
                .get_result::<QrCodeEntity>(conn)?;

            debit_credits(conn, user_id, 1)?;

            Ok(created)
        })
    }

    async fn bulk_create_with_credits(
        &self,
        user_id: Uuid,
        qr_codes: Vec<InsertQrCodeEntity>,
    ) -> std::result::Result<Vec<QrCodeEntity>, CreditTransactionError> {
        let required = i32::try_from(qr_codes.len())
            .map_err(|err| CreditTransactionError::TransactionFailed(err.into()))?;
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<_, CreditTransactionError, _>(|conn| {
            lock_and_check_credits(conn, user_id, required)?;

            let created = insert_into(qr_codes::table)
                .values(&qr_codes)
                .returning(QrCodeEntity::as_returning())
                .get_results::<QrCodeEntity>(conn)?;

            debit_credits(conn, user_id, required)?;

            Ok(created)
        })
    }

    async fn find_by_id(&self, qr_code_id: Uuid) -> Result<Option<QrCodeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let qr_code = qr_codes::table
            .find(qr_code_id)
            .select(QrCodeEntity::as_select())
            .first::<QrCodeEntity>(&mut conn)
            .optional()?;

        Ok(qr_code)
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<QrCodeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = qr_codes::table
            .filter(qr_codes::user_id.eq(user_id))
            .order(qr_codes::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(QrCodeEntity::as_select())
            .load::<QrCodeEntity>(&mut conn)?;

        Ok(results)
    }

    async fn count_by_user(&self, user_id: Uuid) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = qr_codes::table
            .filter(qr_codes::user_id.eq(user_id))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(total)
    }

    async fn update(&self, qr_code_id: Uuid, changes: UpdateQrCodeEntity) -> Result<QrCodeEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(qr_codes::table.find(qr_code_id))
            .set(&changes)
            .returning(QrCodeEntity::as_returning())
            .get_result::<QrCodeEntity>(&mut conn)?;

        Ok(updated)
    }

    async fn delete(&self, qr_code_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = diesel::delete(qr_codes::table.find(qr_code_id)).execute(&mut conn)?;

        Ok(deleted > 0)
    }

    async fn set_webhook(
        &self,
        qr_code_id: Uuid,
        webhook_url: String,
        secret: Option<String>,
    ) -> Result<QrCodeEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let target = update(qr_codes::table.find(qr_code_id));

        let updated = match secret {
            Some(secret) => target
                .set((
                    qr_codes::webhook_url.eq(Some(webhook_url)),
                    qr_codes::webhook_secret.eq(Some(secret)),
                    qr_codes::updated_at.eq(Utc::now()),
                ))
                .returning(QrCodeEntity::as_returning())
                .get_result::<QrCodeEntity>(&mut conn)?,
            None => target
                .set((
                    qr_codes::webhook_url.eq(Some(webhook_url)),
                    qr_codes::updated_at.eq(Utc::now()),
                ))
                .returning(QrCodeEntity::as_returning())
                .get_result::<QrCodeEntity>(&mut conn)?,
        };

        Ok(updated)
    }

    async fn clear_webhook(&self, qr_code_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(qr_codes::table.find(qr_code_id))
            .set((
                qr_codes::webhook_url.eq(None::<String>),
                qr_codes::webhook_secret.eq(None::<String>),
                qr_codes::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn list_webhook_configs(&self, owner_ids: Vec<Uuid>) -> Result<Vec<QrCodeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = qr_codes::table
            .filter(qr_codes::user_id.eq_any(owner_ids))
            .filter(qr_codes::webhook_url.is_not_null())
            .order(qr_codes::created_at.desc())
            .select(QrCodeEntity::as_select())
            .load::<QrCodeEntity>(&mut conn)?;

        Ok(results)
    }
}
