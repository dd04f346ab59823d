use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::entities::rate_limits::InsertRateLimitEventEntity;

#[automock]
#[async_trait]
pub trait RateLimitRepository {
    /// Persists the hit, then returns every hit for the same key and route
    /// after `window_start`, the new one included.
    async fn record_and_load_window(
        &self,
        event: InsertRateLimitEventEntity,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>>;
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
