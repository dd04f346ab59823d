#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub outbound_webhooks: OutboundWebhooks,
    pub schedule: Schedule,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct OutboundWebhooks {
    pub timeout_seconds: u64,
    pub max_attempts: i32,
}

/// Loop intervals, in seconds, plus the rate-limit event retention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub webhook_retry_interval: u64,
    pub grace_downgrade_interval: u64,
    pub rate_limit_prune_interval: u64,
    pub rate_limit_retention_hours: i64,
    pub cache_sweep_interval: u64,
}
