use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::invoices;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = invoices)]
pub struct InvoiceEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub gateway: String,
    pub gateway_invoice_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub pdf_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = invoices)]
pub struct InsertInvoiceEntity {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub gateway: String,
    pub gateway_invoice_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub pdf_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}
