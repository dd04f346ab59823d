use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infra::db::postgres::schema::qr_codes;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Serialize, Deserialize, PartialEq)]
#[diesel(table_name = qr_codes)]
pub struct QrCodeEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub url: String,
    pub title: String,
    pub foreground_color: String,
    pub background_color: String,
    pub dot_type: Option<String>,
    pub corner_type: Option<String>,
    pub logo_url: Option<String>,
    pub has_watermark: bool,
    pub is_dynamic: bool,
    pub dynamic_content: Option<serde_json::Value>,
    pub redirect_url: Option<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_scans: Option<i32>,
    pub scan_count: i32,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub rate_limit_config: Option<serde_json::Value>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QrCodeEntity {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    pub fn scan_limit_reached(&self) -> bool {
        self.max_scans
            .is_some_and(|max_scans| self.scan_count >= max_scans)
    }

    pub fn destination(&self) -> &str {
        self.redirect_url.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = qr_codes)]
pub struct InsertQrCodeEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub url: String,
    pub title: String,
    pub foreground_color: String,
    pub background_color: String,
    pub dot_type: Option<String>,
    pub corner_type: Option<String>,
    pub logo_url: Option<String>,
    pub has_watermark: bool,
    pub is_dynamic: bool,
    pub dynamic_content: Option<serde_json::Value>,
    pub redirect_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_scans: Option<i32>,
    pub rate_limit_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = qr_codes)]
pub struct UpdateQrCodeEntity {
    pub url: Option<String>,
    pub title: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub dot_type: Option<Option<String>>,
    pub corner_type: Option<Option<String>>,
    pub logo_url: Option<Option<String>>,
    pub dynamic_content: Option<Option<serde_json::Value>>,
    pub redirect_url: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub max_scans: Option<Option<i32>>,
    pub rate_limit_config: Option<Option<serde_json::Value>>,
    pub updated_at: Option<DateTime<Utc>>,
}
