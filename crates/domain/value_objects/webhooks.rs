use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{qr_codes::QrCodeEntity, webhook_logs::WebhookLogEntity},
    value_objects::validation::{FieldError, validate_http_url},
};

pub const WEBHOOK_USER_AGENT: &str = "QR-Generator-Webhook/1.0";
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const SCAN_EVENT: &str = "qr.scanned";
pub const DEFAULT_LOG_PAGE_SIZE: i64 = 50;
pub const MAX_LOG_PAGE_SIZE: i64 = 100;
pub const MAX_STORED_RESPONSE_BYTES: usize = 2048;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigureWebhookModel {
    pub qr_code_id: Option<Uuid>,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub regenerate_secret: bool,
}

impl ConfigureWebhookModel {
    pub fn validate(&self) -> Result<(Uuid, String), FieldError> {
        let qr_code_id = self
            .qr_code_id
            .ok_or_else(|| FieldError::missing("qrCodeId"))?;
        let webhook_url = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| FieldError::missing("webhookUrl"))?;
        let parsed = validate_http_url("webhookUrl", webhook_url, 2048)?;
        Ok((qr_code_id, parsed.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveWebhookQuery {
    pub qr_code_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfigDto {
    pub qr_code_id: Uuid,
    pub title: String,
    pub webhook_url: Option<String>,
    pub has_secret: bool,
}

impl From<&QrCodeEntity> for WebhookConfigDto {
    fn from(qr_code: &QrCodeEntity) -> Self {
        Self {
            qr_code_id: qr_code.id,
            title: qr_code.title.clone(),
            webhook_url: qr_code.webhook_url.clone(),
            has_secret: qr_code.webhook_secret.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredWebhookDto {
    pub qr_code_id: Uuid,
    pub webhook_url: String,
    /// Present only when a secret was generated by this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookLogStatus {
    Success,
    Failed,
}

impl WebhookLogStatus {
    pub fn is_successful(&self) -> bool {
        matches!(self, WebhookLogStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WebhookLogsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<WebhookLogStatus>,
}

impl WebhookLogsQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LOG_PAGE_SIZE)
            .clamp(1, MAX_LOG_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogDto {
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

impl From<WebhookLogEntity> for WebhookLogDto {
    fn from(entity: WebhookLogEntity) -> Self {
        Self {
            id: entity.id,
            qr_code_id: entity.qr_code_id,
            webhook_url: entity.webhook_url,
            payload: entity.payload,
            response_status: entity.response_status,
            response_body: entity.response_body,
            is_successful: entity.is_successful,
            attempts: entity.attempts,
            last_attempt_at: entity.last_attempt_at,
            created_at: entity.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogPageDto {
    pub logs: Vec<WebhookLogDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryWebhookModel {
    pub log_id: Option<Uuid>,
}

/// What the receiving endpoint answered, or why no answer arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub is_successful: bool,
}

impl DeliveryOutcome {
    pub fn from_response(status: u16, body: &str) -> Self {
        Self {
            response_status: Some(i32::from(status)),
            response_body: Some(truncate_body(body)),
            is_successful: (200..300).contains(&status),
        }
    }

    pub fn from_transport_error(message: &str) -> Self {
        Self {
            response_status: None,
            response_body: Some(truncate_body(message)),
            is_successful: false,
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_STORED_RESPONSE_BYTES {
        return body.to_string();
    }
    let mut end = MAX_STORED_RESPONSE_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
