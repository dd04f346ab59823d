use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::qr_code_webhook_logs;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = qr_code_webhook_logs)]
pub struct WebhookLogEntity {
    pub id: Uuid,
    pub qr_code_id: Uuid,
    pub webhook_url: String,
    pub payload: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub is_successful: bool,
    pub attempts: i32,
    pub last_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = qr_code_webhook_logs)]
pub struct InsertWebhookLogEntity {
    pub qr_code_id: Uuid,
    pub webhook_url: String,
    pub payload: serde_json::Value,
    pub is_successful: bool,
    pub attempts: i32,
    pub last_attempt_at: DateTime<Utc>,
}
