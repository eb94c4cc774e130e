use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::{MatchMethod, MatchResult, UserProfile};

/// Errors that can occur with cache operations
///
/// The engine never fails a request on these; it logs them and carries on
/// without caching.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Memoized match set for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub results: Vec<MatchResult>,
    /// Tier that originally produced the results; logged, never surfaced
    pub method: MatchMethod,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_milliseconds() >= (self.ttl_secs as i64).saturating_mul(1000)
    }
}

/// Shared store behind the in-process tier
#[async_trait]
pub trait RemoteCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Redis-backed remote tier
pub struct RedisCache {
    // Store ConnectionManager in a Mutex for interior mutability
    redis: tokio::sync::Mutex<ConnectionManager>,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self {
            redis: tokio::sync::Mutex::new(redis),
        })
    }
}

#[async_trait]
impl RemoteCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        Ok(())
    }
}

/// Two-tier result cache
///
/// L1 is an in-process moka cache with TTL, L2 an optional shared store
/// (Redis in production). Reads try L1 first and backfill it from L2.
pub struct ResultCache {
    l1_cache: moka::future::Cache<String, Arc<CacheEntry>>,
    remote: Option<Arc<dyn RemoteCache>>,
    ttl_secs: u64,
}

impl ResultCache {
    pub fn new(l1_size: u64, ttl_secs: u64) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            l1_cache,
            remote: None,
            ttl_secs,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteCache>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Get an unexpired entry (L1 first, then L2)
    pub async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = CacheKey::matches(fingerprint);
        let now = Utc::now();

        if let Some(entry) = self.l1_cache.get(&key).await {
            if !entry.is_expired(now) {
                tracing::trace!("L1 cache hit: {}", key);
                return Ok(Some(entry.as_ref().clone()));
            }
            self.l1_cache.invalidate(&key).await;
        }

        let Some(remote) = &self.remote else {
            tracing::trace!("Cache miss: {}", key);
            return Ok(None);
        };

        match remote.get(&key).await? {
            Some(json) => {
                let entry: CacheEntry = serde_json::from_str(&json)?;
                if entry.is_expired(now) {
                    return Ok(None);
                }
                tracing::trace!("L2 cache hit: {}", key);
                self.l1_cache.insert(key, Arc::new(entry.clone())).await;
                Ok(Some(entry))
            }
            None => {
                tracing::trace!("Cache miss: {}", key);
                Ok(None)
            }
        }
    }

    /// Store a validated match set in both tiers
    pub async fn put(
        &self,
        fingerprint: &str,
        results: Vec<MatchResult>,
        method: MatchMethod,
    ) -> Result<CacheEntry, CacheError> {
        let key = CacheKey::matches(fingerprint);
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            results,
            method,
            created_at: Utc::now(),
            ttl_secs: self.ttl_secs,
        };

        self.l1_cache.insert(key.clone(), Arc::new(entry.clone())).await;

        if let Some(remote) = &self.remote {
            let json = serde_json::to_string(&entry)?;
            remote.set(&key, json, self.ttl_secs).await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(entry)
    }

    /// Delete one fingerprint from both tiers
    pub async fn invalidate(&self, fingerprint: &str) -> Result<(), CacheError> {
        let key = CacheKey::matches(fingerprint);
        self.l1_cache.invalidate(&key).await;
        if let Some(remote) = &self.remote {
            remote.delete(&key).await?;
        }
        Ok(())
    }

    /// Drop every in-process entry
    pub fn clear(&self) {
        self.l1_cache.invalidate_all();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            remote_enabled: self.remote.is_some(),
            ttl_secs: self.ttl_secs,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub remote_enabled: bool,
    pub ttl_secs: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a match set
    pub fn matches(fingerprint: &str) -> String {
        format!("matches:{}", fingerprint)
    }
}

/// Stable match fingerprint for (user, pool version)
///
/// List fields are lower-cased and sorted so order does not matter. Every
/// field that feeds eligibility or scoring is included, as is the
/// subscription tier since it changes the result count.
pub fn fingerprint(user: &UserProfile, pool_version: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [
        user.email.trim().to_lowercase(),
        normalized_list(&user.target_cities),
        normalized_list(&user.languages_spoken),
        normalized_list(&user.career_path),
        normalized_list(&user.skills),
        normalized_list(&user.industries),
        format!("{:?}", user.experience_level),
        user.visa_status.trim().to_lowercase(),
        user.subscription_tier.to_string(),
        pool_version.to_string(),
    ] {
        hasher.update(part.as_bytes());
        // Separator keeps ("ab", "c") distinct from ("a", "bc")
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

fn normalized_list(values: &[String]) -> String {
    let mut values: Vec<String> = values.iter().map(|v| v.trim().to_lowercase()).collect();
    values.sort();
    values.join(",")
}
