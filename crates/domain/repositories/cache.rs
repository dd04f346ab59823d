use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// Key/value cache with per-entry TTL. Never the source of truth.
#[automock]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}
