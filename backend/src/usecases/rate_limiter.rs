use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    entities::rate_limits::InsertRateLimitEventEntity,
    repositories::rate_limits::RateLimitRepository,
    value_objects::rate_limits::{RateLimitDecision, RateLimitPolicy, evaluate_window},
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded, retry after {retry_after}s")]
    Limited { retry_after: i64 },
    #[error("rate limit store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

/// Rolling-window limiter over persisted request events.
pub struct RateLimiter {
    repository: Arc<dyn RateLimitRepository + Send + Sync>,
    fail_open: bool,
}

impl RateLimiter {
    pub fn new(repository: Arc<dyn RateLimitRepository + Send + Sync>, fail_open: bool) -> Self {
        Self {
            repository,
            fail_open,
        }
    }

    /// Records this request and decides it. Rejected requests stay in the window.
    pub async fn rate_limit(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let now = Utc::now();
        let event = InsertRateLimitEventEntity {
            key: key.to_string(),
            route: policy.route.clone(),
            requested_at: now,
        };

        let hits = match self
            .repository
            .record_and_load_window(event, now - policy.window())
            .await
        {
            Ok(hits) => hits,
            Err(err) if self.fail_open => {
                warn!(
                    key,
                    route = %policy.route,
                    db_error = ?err,
                    "rate_limiter: store unavailable, failing open"
                );
                return Ok(RateLimitDecision::allow_unchecked(policy));
            }
            Err(err) => {
                warn!(
                    key,
                    route = %policy.route,
                    db_error = ?err,
                    "rate_limiter: store unavailable, rejecting"
                );
                return Err(RateLimitError::Unavailable(err));
            }
        };

        let decision = evaluate_window(&hits, now, policy);
        if !decision.allowed {
            debug!(
                key,
                route = %policy.route,
                retry_after = decision.retry_after,
                "rate_limiter: request rejected"
            );
        }
        Ok(decision)
    }

    /// `rate_limit` that turns a rejection into `RateLimitError::Limited`.
    pub async fn enforce(
        &self,
        key: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let decision = self.rate_limit(key, policy).await?;
        if decision.allowed {
            return Ok(decision);
        }
        Err(RateLimitError::Limited {
            retry_after: decision.retry_after.unwrap_or(policy.window_seconds),
        })
    }
}
