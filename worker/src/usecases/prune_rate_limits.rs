use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use crates::domain::repositories::rate_limits::RateLimitRepository;
use tracing::{debug, info};

pub struct PruneRateLimitsUseCase {
    repository: Arc<dyn RateLimitRepository + Send + Sync>,
    retention: Duration,
}

impl PruneRateLimitsUseCase {
    pub fn new(repository: Arc<dyn RateLimitRepository + Send + Sync>, retention_hours: i64) -> Self {
        Self {
            repository,
            retention: Duration::hours(retention_hours.max(1)),
        }
    }

    /// Deletes rate-limit events older than the retention window. Returns the number removed.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.retention;
        let removed = self.repository.prune_before(cutoff).await?;

        if removed > 0 {
            info!(removed, %cutoff, "prune_rate_limits: removed stale events");
        } else {
            debug!(%cutoff, "prune_rate_limits: nothing to remove");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::rate_limits::MockRateLimitRepository;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn prunes_everything_older_than_the_retention() {
        let now = Utc::now();
        let mut repository = MockRateLimitRepository::new();
        repository
            .expect_prune_before()
            .with(eq(now - Duration::hours(24)))
            .times(1)
            .returning(|_| Ok(42));

        let usecase = PruneRateLimitsUseCase::new(Arc::new(repository), 24);
        assert_eq!(usecase.run(now).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn retention_is_at_least_an_hour() {
        let now = Utc::now();
        let mut repository = MockRateLimitRepository::new();
        repository
            .expect_prune_before()
            .with(eq(now - Duration::hours(1)))
            .returning(|_| Ok(0));

        let usecase = PruneRateLimitsUseCase::new(Arc::new(repository), 0);
        assert_eq!(usecase.run(now).await.unwrap(), 0);
    }
}
