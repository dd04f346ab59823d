use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::{sync::RwLock, task::JoinHandle, time::Instant};
use tracing::debug;

use crate::domain::repositories::cache::CacheStore;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub entries: usize,
}

/// Per-process TTL cache. Expired entries are dropped lazily on read and by `sweep_expired`.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            entries: self.entries.read().await.len(),
        }
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired().await;
                if removed > 0 {
                    debug!(removed, "cache: swept expired entries");
                }
            }
        })
    }

    fn record_miss(&self) -> Result<Option<serde_json::Value>> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return self.record_miss(),
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        self.record_miss()
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        if self.entries.write().await.remove(key).is_some() {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|entry| !entry.is_expired(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("user:1:credits", json!({"credits": 5}), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(
            cache.get("user:1:credits").await.unwrap(),
            Some(json!({"credits": 5}))
        );
        assert!(cache.exists("user:1:credits").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("user:1:credits").await.unwrap(), None);
        assert!(!cache.exists("user:1:credits").await.unwrap());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), Duration::from_secs(10)).await.unwrap();
        cache.set("long", json!(2), Duration::from_secs(300)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.sweep_expired().await, 1);
        assert!(cache.exists("long").await.unwrap());
    }

    #[tokio::test]
    async fn delete_counts_only_present_keys() {
        let cache = MemoryCache::new();
        cache.set("qr:1", json!("x"), Duration::from_secs(300)).await.unwrap();
        cache.del("qr:1").await.unwrap();
        cache.del("qr:1").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(cache.get("qr:1").await.unwrap(), None);
    }
}
