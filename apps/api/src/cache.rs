//! Read-through cache abstraction for short-lived lookups (opportunity metadata).
//!
//! Entries expire by TTL; the in-memory backend also caps its size. Values are opaque strings; callers own the encoding.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ENTRIES: usize = 1000;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn evict(&self, key: &str);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
}

/// Process-local cache, bounded by `max_entries`. Expired entries are dropped
/// when read and by [`MemoryCache::spawn_sweeper`].
pub struct MemoryCache {
    ttl: Duration,
    max_entries: usize,
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: DashMap::new(),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Purges expired entries every `every` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    info!(
                        "Cache sweep: purged {purged}, {} entries remaining",
                        self.entries.len()
                    );
                }
            }
        })
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!("Evicted oldest cache entry: {key}");
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let entry = self.entries.get(key)?;
            if entry.created_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove(key);
        debug!("Cache entry expired: {key}");
        None
    }

    async fn set(&self, key: &str, value: String) {
        let full = !self.entries.contains_key(key) && self.entries.len() >= self.max_entries;
        if full && self.purge_expired() == 0 {
            self.evict_oldest();
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
    }

    async fn evict(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Shared cache in Redis using `SET key value EX ttl`. Redis errors degrade to a miss.
pub struct RedisCache {
    connection: MultiplexedConnection,
    ttl: Duration,
    prefix: &'static str,
}

impl RedisCache {
    pub fn new(connection: MultiplexedConnection, ttl: Duration) -> Self {
        Self {
            connection,
            ttl,
            prefix: "cache",
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection.clone();
        match conn.get::<_, Option<String>>(self.key(key)).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache read failed for {key}: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String) {
        let mut conn = self.connection.clone();
        let result: redis::RedisResult<()> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await;
        if let Err(e) = result {
            warn!("Cache write failed for {key}: {e}");
        }
    }

    async fn evict(&self, key: &str) {
        let mut conn = self.connection.clone();
        if let Err(e) = conn.del::<_, ()>(self.key(key)).await {
            warn!("Cache evict failed for {key}: {e}");
        }
    }
}
