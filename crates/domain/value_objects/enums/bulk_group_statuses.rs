use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BulkGroupStatus {
    Processing,
    Completed,
    Failed,
}

impl Display for BulkGroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            BulkGroupStatus::Processing => "processing",
            BulkGroupStatus::Completed => "completed",
            BulkGroupStatus::Failed => "failed",
        };
        write!(f, "{}", status)
    }
}
