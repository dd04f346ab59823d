use anyhow::{Context, Result};

use super::config_model::{Database, DotEnvyConfig, OutboundWebhooks, Schedule, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: optional("SERVER_PORT_WORKER", "8081")
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: optional("SERVER_BODY_LIMIT", "1")
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: optional("SERVER_TIMEOUT", "30")
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").context("DATABASE_URL is invalid")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS", "5")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let outbound_webhooks = OutboundWebhooks {
        timeout_seconds: optional("OUTBOUND_WEBHOOK_TIMEOUT_SECONDS", "30")
            .parse()
            .context("OUTBOUND_WEBHOOK_TIMEOUT_SECONDS is invalid")?,
        max_attempts: optional("OUTBOUND_WEBHOOK_MAX_ATTEMPTS", "5")
            .parse()
            .context("OUTBOUND_WEBHOOK_MAX_ATTEMPTS is invalid")?,
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        outbound_webhooks,
        schedule: load_schedule()?,
    })
}

fn load_schedule() -> Result<Schedule> {
    Ok(Schedule {
        webhook_retry_interval: seconds("WEBHOOK_RETRY_INTERVAL_SECONDS", "60")?,
        grace_downgrade_interval: seconds("GRACE_DOWNGRADE_INTERVAL_SECONDS", "3600")?,
        rate_limit_prune_interval: seconds("RATE_LIMIT_PRUNE_INTERVAL_SECONDS", "3600")?,
        rate_limit_retention_hours: optional("RATE_LIMIT_RETENTION_HOURS", "24")
            .parse::<i64>()
            .context("RATE_LIMIT_RETENTION_HOURS is invalid")?
            .max(1),
        cache_sweep_interval: seconds("CACHE_SWEEP_INTERVAL_SECONDS", "60")?,
    })
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Zero would turn a loop into a busy spin, so intervals are at least one second.
fn seconds(key: &str, default: &str) -> Result<u64> {
    let value: u64 = optional(key, default)
        .parse()
        .with_context(|| format!("{key} is invalid"))?;
    Ok(value.max(1))
}
