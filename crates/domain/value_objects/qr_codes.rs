use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::qr_codes::{InsertQrCodeEntity, QrCodeEntity, UpdateQrCodeEntity},
    value_objects::validation::{FieldError, validate_hex_color, validate_http_url},
};

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const DEFAULT_TITLE: &str = "Untitled QR Code";
pub const DEFAULT_FOREGROUND: &str = "#000000";
pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Longest per-QR scan window: 30 days.
pub const MAX_RATE_LIMIT_WINDOW_SECONDS: i64 = 30 * 24 * 3600;
pub const MAX_RATE_LIMIT_REQUESTS: i64 = 1_000_000;

/// Per-QR scan throttling, stored as JSON on the QR row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RateLimitConfig {
    pub window_size: Option<i64>,
    pub max_requests: Option<i64>,
}

impl RateLimitConfig {
    fn validate(&self) -> Result<(), FieldError> {
        if self
            .window_size
            .is_some_and(|v| !(1..=MAX_RATE_LIMIT_WINDOW_SECONDS).contains(&v))
        {
            return Err(FieldError::out_of_range(
                "rateLimitConfig.windowSize",
                format!("rateLimitConfig.windowSize must be between 1 and {MAX_RATE_LIMIT_WINDOW_SECONDS}"),
            ));
        }
        if self
            .max_requests
            .is_some_and(|v| !(1..=MAX_RATE_LIMIT_REQUESTS).contains(&v))
        {
            return Err(FieldError::out_of_range(
                "rateLimitConfig.maxRequests",
                format!("rateLimitConfig.maxRequests must be between 1 and {MAX_RATE_LIMIT_REQUESTS}"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateQrCodeModel {
    pub url: Option<String>,
    pub title: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub dot_type: Option<String>,
    pub corner_type: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub is_dynamic: bool,
    pub dynamic_content: Option<serde_json::Value>,
    pub redirect_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_scans: Option<i32>,
    pub organization_id: Option<Uuid>,
    pub rate_limit_config: Option<RateLimitConfig>,
}

impl CreateQrCodeModel {
    pub fn validate(&self) -> Result<(), FieldError> {
        let url = self.url.as_deref().ok_or_else(|| FieldError::missing("url"))?;
        validate_http_url("url", url, MAX_URL_LENGTH)?;

        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(color) = &self.foreground_color {
            validate_hex_color("foregroundColor", color)?;
        }
        if let Some(color) = &self.background_color {
            validate_hex_color("backgroundColor", color)?;
        }
        if let Some(logo_url) = &self.logo_url {
            validate_http_url("logoUrl", logo_url, MAX_URL_LENGTH)?;
        }
        if let Some(redirect_url) = &self.redirect_url {
            validate_http_url("redirectUrl", redirect_url, MAX_URL_LENGTH)?;
        }
        if self.max_scans.is_some_and(|v| v <= 0) {
            return Err(FieldError::out_of_range(
                "maxScans",
                "maxScans must be greater than zero",
            ));
        }
        if let Some(config) = &self.rate_limit_config {
            config.validate()?;
        }

        Ok(())
    }

    pub fn has_logo(&self) -> bool {
        self.logo_url.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    pub fn into_insert_entity(self, id: Uuid, user_id: Uuid, has_watermark: bool) -> InsertQrCodeEntity {
        InsertQrCodeEntity {
            id,
            user_id,
            organization_id: self.organization_id,
            url: self.url.unwrap_or_default().trim().to_string(),
            title: self
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            foreground_color: self
                .foreground_color
                .unwrap_or_else(|| DEFAULT_FOREGROUND.to_string()),
            background_color: self
                .background_color
                .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
            dot_type: self.dot_type,
            corner_type: self.corner_type,
            logo_url: self.logo_url,
            has_watermark,
            is_dynamic: self.is_dynamic,
            dynamic_content: self.dynamic_content,
            redirect_url: self.redirect_url,
            expires_at: self.expires_at,
            max_scans: self.max_scans,
            rate_limit_config: self
                .rate_limit_config
                .and_then(|config| serde_json::to_value(config).ok()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateQrCodeModel {
    pub url: Option<String>,
    pub title: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub dot_type: Option<String>,
    pub corner_type: Option<String>,
    pub logo_url: Option<String>,
    pub dynamic_content: Option<serde_json::Value>,
    pub redirect_url: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_scans: Option<i32>,
    pub rate_limit_config: Option<RateLimitConfig>,
}

impl UpdateQrCodeModel {
    pub fn validate(&self) -> Result<(), FieldError> {
        if let Some(url) = &self.url {
            validate_http_url("url", url, MAX_URL_LENGTH)?;
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(color) = &self.foreground_color {
            validate_hex_color("foregroundColor", color)?;
        }
        if let Some(color) = &self.background_color {
            validate_hex_color("backgroundColor", color)?;
        }
        if let Some(logo_url) = &self.logo_url {
            validate_http_url("logoUrl", logo_url, MAX_URL_LENGTH)?;
        }
        if let Some(redirect_url) = &self.redirect_url {
            validate_http_url("redirectUrl", redirect_url, MAX_URL_LENGTH)?;
        }
        if self.max_scans.is_some_and(|v| v <= 0) {
            return Err(FieldError::out_of_range(
                "maxScans",
                "maxScans must be greater than zero",
            ));
        }
        if let Some(config) = &self.rate_limit_config {
            config.validate()?;
        }
        Ok(())
    }

    pub fn has_logo(&self) -> bool {
        self.logo_url.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    pub fn into_changeset(self, now: DateTime<Utc>) -> UpdateQrCodeEntity {
        UpdateQrCodeEntity {
            url: self.url.map(|v| v.trim().to_string()),
            title: self.title.map(|v| v.trim().to_string()),
            foreground_color: self.foreground_color,
            background_color: self.background_color,
            dot_type: self.dot_type.map(Some),
            corner_type: self.corner_type.map(Some),
            logo_url: self.logo_url.map(Some),
            dynamic_content: self.dynamic_content.map(Some),
            redirect_url: self.redirect_url.map(Some),
            is_active: self.is_active,
            expires_at: self.expires_at.map(Some),
            max_scans: self.max_scans.map(Some),
            rate_limit_config: self
                .rate_limit_config
                .and_then(|config| serde_json::to_value(config).ok())
                .map(Some),
            updated_at: Some(now),
        }
    }
}

fn validate_title(title: &str) -> Result<(), FieldError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(FieldError::out_of_range(
            "title",
            format!("title must be at most {MAX_TITLE_LENGTH} characters"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Client-facing view of a QR code; the webhook secret never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeDto {
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
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QrCodeEntity> for QrCodeDto {
    fn from(entity: QrCodeEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            organization_id: entity.organization_id,
            url: entity.url,
            title: entity.title,
            foreground_color: entity.foreground_color,
            background_color: entity.background_color,
            dot_type: entity.dot_type,
            corner_type: entity.corner_type,
            logo_url: entity.logo_url,
            has_watermark: entity.has_watermark,
            is_dynamic: entity.is_dynamic,
            dynamic_content: entity.dynamic_content,
            redirect_url: entity.redirect_url,
            is_active: entity.is_active,
            expires_at: entity.expires_at,
            max_scans: entity.max_scans,
            scan_count: entity.scan_count,
            last_scanned_at: entity.last_scanned_at,
            webhook_url: entity.webhook_url,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeListDto {
    pub qr_codes: Vec<QrCodeDto>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalanceDto {
    pub credits: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::validation::FieldErrorKind;

    fn model(url: &str) -> CreateQrCodeModel {
        CreateQrCodeModel {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_url_is_reported_as_missing_field() {
        let err = CreateQrCodeModel::default().validate().unwrap_err();
        assert_eq!(err.kind, FieldErrorKind::Missing);
        assert_eq!(err.field, "url");
    }

    #[test]
    fn non_positive_max_scans_is_rejected() {
        let mut create = model("https://a.com");
        create.max_scans = Some(0);
        assert_eq!(create.validate().unwrap_err().field, "maxScans");
    }

    #[test]
    fn oversized_scan_window_is_rejected() {
        let create: CreateQrCodeModel = serde_json::from_value(serde_json::json!({
            "url": "https://a.com",
            "rateLimitConfig": { "windowSize": 100_000_000_000_000_i64 }
        }))
        .unwrap();
        assert_eq!(
            create.validate().unwrap_err().field,
            "rateLimitConfig.windowSize"
        );

        let mut create = model("https://a.com");
        create.rate_limit_config = Some(RateLimitConfig {
            window_size: Some(MAX_RATE_LIMIT_WINDOW_SECONDS),
            max_requests: Some(10),
        });
        assert!(create.validate().is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected_at_deserialization() {
        let parsed = serde_json::from_value::<CreateQrCodeModel>(serde_json::json!({
            "url": "https://a.com",
            "colour": "#000000"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn insert_entity_fills_defaults() {
        let id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let entity = model(" https://a.com ").into_insert_entity(id, user_id, true);

        assert_eq!(entity.url, "https://a.com");
        assert_eq!(entity.title, DEFAULT_TITLE);
        assert_eq!(entity.foreground_color, DEFAULT_FOREGROUND);
        assert_eq!(entity.background_color, DEFAULT_BACKGROUND);
        assert!(entity.has_watermark);
        assert_eq!(entity.user_id, user_id);
    }

    #[test]
    fn page_query_clamps_limits() {
        let query = PageQuery {
            page: Some(0),
            limit: Some(1_000),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = PageQuery {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(query.offset(), 20);
    }
}
