use std::{future::Future, time::Duration};

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::domain::repositories::cache::CacheStore;

/// Reads and decodes a cached value. Store or decode failures count as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(key, decode_error = ?err, "cache: dropping undecodable entry");
                if let Err(err) = cache.del(key).await {
                    warn!(key, cache_error = ?err, "cache: failed to drop undecodable entry");
                }
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(key, cache_error = ?err, "cache: read failed, treating as miss");
            None
        }
    }
}

pub async fn set_json<T: Serialize>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
    let encoded = match serde_json::to_value(value) {
        Ok(encoded) => encoded,
        Err(err) => {
            warn!(key, encode_error = ?err, "cache: value not serializable, skipping");
            return;
        }
    };
    if let Err(err) = cache.set(key, encoded, ttl).await {
        warn!(key, cache_error = ?err, "cache: write failed");
    }
}

pub async fn invalidate(cache: &dyn CacheStore, keys: &[String]) {
    for key in keys {
        if let Err(err) = cache.del(key).await {
            warn!(key = %key, cache_error = ?err, "cache: invalidation failed");
        }
    }
}

/// Returns the cached value or runs `loader` and caches its result.
pub async fn get_or_set<T, F, Fut>(cache: &dyn CacheStore, key: &str, ttl: Duration, loader: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if let Some(cached) = get_json::<T>(cache, key).await {
        return Ok(cached);
    }

    let loaded = loader().await?;
    set_json(cache, key, &loaded, ttl).await;
    Ok(loaded)
}
