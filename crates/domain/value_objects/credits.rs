use serde::Deserialize;
use thiserror::Error;

use crate::domain::value_objects::validation::FieldError;

/// Failure modes of the credit-debiting QR transaction.
#[derive(Debug, Error)]
pub enum CreditTransactionError {
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i32, available: i32 },
    #[error("user not found")]
    UserNotFound,
    #[error("credit transaction failed: {0}")]
    TransactionFailed(#[source] anyhow::Error),
}

impl From<diesel::result::Error> for CreditTransactionError {
    fn from(err: diesel::result::Error) -> Self {
        CreditTransactionError::TransactionFailed(err.into())
    }
}

impl From<diesel::r2d2::PoolError> for CreditTransactionError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        CreditTransactionError::TransactionFailed(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditAdjustment {
    Applied { balance: i32 },
    UserNotFound,
    WouldGoNegative { balance: i32 },
}

/// Body of the admin credit adjustment endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdjustCreditsModel {
    pub delta: Option<i32>,
    pub reason: Option<String>,
}

impl AdjustCreditsModel {
    pub fn validate(&self) -> Result<i32, FieldError> {
        match self.delta {
            None => Err(FieldError::missing("delta")),
            Some(0) => Err(FieldError::out_of_range("delta", "delta must not be zero")),
            Some(delta) => Ok(delta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_requires_a_non_zero_delta() {
        let model = AdjustCreditsModel {
            delta: None,
            reason: None,
        };
        assert_eq!(model.validate().unwrap_err().field, "delta");

        let model = AdjustCreditsModel {
            delta: Some(0),
            reason: None,
        };
        assert!(model.validate().is_err());

        let model = AdjustCreditsModel {
            delta: Some(-5),
            reason: Some("refund".to_string()),
        };
        assert_eq!(model.validate().unwrap(), -5);
    }
}
