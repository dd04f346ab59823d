use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::qr_code_bulk_groups;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = qr_code_bulk_groups)]
pub struct BulkGroupEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_name: String,
    pub operation_type: String,
    pub total_count: i32,
    pub processed_count: i32,
    pub failed_count: i32,
    pub status: String,
    pub results: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = qr_code_bulk_groups)]
pub struct InsertBulkGroupEntity {
    pub user_id: Uuid,
    pub group_name: String,
    pub operation_type: String,
    pub total_count: i32,
    pub status: String,
}
