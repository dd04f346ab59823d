use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::invoices},
};
use domain::{entities::invoices::InsertInvoiceEntity, repositories::invoices::InvoiceRepository};

pub struct InvoicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InvoicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl InvoiceRepository for InvoicePostgres {
    async fn create_invoice(&self, invoice: InsertInvoiceEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice_id = insert_into(invoices::table)
            .values(&invoice)
            .on_conflict((invoices::gateway, invoices::gateway_invoice_id))
            .do_update()
            .set((
                invoices::status.eq(excluded(invoices::status)),
                invoices::paid_at.eq(excluded(invoices::paid_at)),
                invoices::pdf_url.eq(excluded(invoices::pdf_url)),
            ))
            .returning(invoices::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(invoice_id)
    }
}
