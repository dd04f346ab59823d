use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::bulk_groups::BulkGroupEntity,
    value_objects::{
        enums::bulk_operations::BulkOperation,
        qr_codes::{CreateQrCodeModel, QrCodeDto, UpdateQrCodeModel},
        scans::ScanAnalyticsDto,
        validation::FieldError,
    },
};

pub const MAX_BULK_ITEMS: usize = 100;
pub const BULK_GROUP_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkOperationModel {
    pub operation: Option<BulkOperation>,
    #[serde(default)]
    pub qr_codes: Vec<serde_json::Value>,
    pub group_name: Option<String>,
}

impl BulkOperationModel {
    pub fn validate(&self) -> Result<BulkOperation, FieldError> {
        let operation = self
            .operation
            .ok_or_else(|| FieldError::missing("operation"))?;
        if self.qr_codes.is_empty() {
            return Err(FieldError::missing("qrCodes"));
        }
        if self.qr_codes.len() > MAX_BULK_ITEMS {
            return Err(FieldError::out_of_range(
                "qrCodes",
                format!("at most {MAX_BULK_ITEMS} QR codes per bulk operation"),
            ));
        }
        Ok(operation)
    }

    pub fn group_name_or_default(&self, operation: BulkOperation, now: DateTime<Utc>) -> String {
        self.group_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Bulk {operation} - {}", now.to_rfc3339()))
    }
}

/// Parses every create item up front; one bad item rejects the whole batch.
pub fn parse_create_items(items: &[serde_json::Value]) -> Result<Vec<CreateQrCodeModel>, FieldError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let model: CreateQrCodeModel = serde_json::from_value(item.clone()).map_err(|err| {
                FieldError::invalid_format(&format!("qrCodes[{index}]"), err.to_string())
            })?;
            model.validate().map_err(|err| FieldError {
                field: format!("qrCodes[{index}].{}", err.field),
                ..err
            })?;
            Ok(model)
        })
        .collect()
}

pub fn item_id(item: &serde_json::Value) -> Result<Uuid, String> {
    item.get("id")
        .and_then(serde_json::Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| "QR code id is required for this operation".to_string())
}

pub fn parse_update_item(item: &serde_json::Value) -> Result<(Uuid, UpdateQrCodeModel), String> {
    let id = item_id(item)?;
    let mut fields = item.clone();
    if let Some(object) = fields.as_object_mut() {
        object.remove("id");
    }
    let model: UpdateQrCodeModel =
        serde_json::from_value(fields).map_err(|err| format!("invalid update: {err}"))?;
    model.validate().map_err(|err| err.to_string())?;
    Ok((id, model))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemError {
    pub qr_code: serde_json::Value,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkResults {
    pub successful: Vec<serde_json::Value>,
    pub failed: Vec<serde_json::Value>,
    pub errors: Vec<BulkItemError>,
}

impl BulkResults {
    pub fn record_success(&mut self, result: serde_json::Value) {
        self.successful.push(result);
    }

    pub fn record_failure(&mut self, item: serde_json::Value, error: impl Into<String>) {
        self.failed.push(item.clone());
        self.errors.push(BulkItemError {
            qr_code: item,
            error: error.into(),
        });
    }

    pub fn processed_count(&self) -> i32 {
        self.successful.len() as i32
    }

    pub fn failed_count(&self) -> i32 {
        self.failed.len() as i32
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkExportDto {
    #[serde(flatten)]
    pub qr_code: QrCodeDto,
    pub analytics: ScanAnalyticsDto,
    pub export_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkGroupDto {
    pub id: Uuid,
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

impl From<BulkGroupEntity> for BulkGroupDto {
    fn from(entity: BulkGroupEntity) -> Self {
        Self {
            id: entity.id,
            group_name: entity.group_name,
            operation_type: entity.operation_type,
            total_count: entity.total_count,
            processed_count: entity.processed_count,
            failed_count: entity.failed_count,
            status: entity.status,
            results: entity.results,
            created_at: entity.created_at,
            completed_at: entity.completed_at,
        }
    }
}

/// Response of one bulk run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRunDto {
    pub bulk_group_id: Uuid,
    pub operation: BulkOperation,
    pub processed: i32,
    pub failed: i32,
    pub results: BulkResults,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkGroupQuery {
    #[serde(alias = "bulk_group_id")]
    pub bulk_group_id: Option<Uuid>,
}
