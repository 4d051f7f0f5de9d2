// src/services/artifact_cache.rs
use crate::errors::Result;
use crate::models::{CacheEntry, CacheInfo};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Entries older than this are purged on read.
pub const CACHE_TTL_DAYS: i64 = 30;

/// Key-to-record storage behind the cache.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Metadata only; implementations should avoid loading the blob.
    async fn metadata(&self, key: &str) -> Result<Option<CacheInfo>>;

    async fn put(&self, entry: CacheEntry) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    fn name(&self) -> &str;
}

/// Wall clock in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn metadata(&self, key: &str) -> Result<Option<CacheInfo>> {
        Ok(self.entries.read().await.get(key).map(CacheEntry::info))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Version- and age-checked cache for large binary artifacts.
///
/// An entry is only returned when its version equals the configured version
/// exactly and it was written less than [`CACHE_TTL_DAYS`] ago. Anything else
/// is deleted by the read that notices it and reported as a miss. Storage
/// failures are logged and also surface as a miss (or `false` for writes).
pub struct ArtifactCache {
    store: Arc<dyn ArtifactStore>,
    version: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn ArtifactStore>, version: impl Into<String>) -> Self {
        Self::with_clock(store, version, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn ArtifactStore>,
        version: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            version: version.into(),
            ttl: Duration::days(CACHE_TTL_DAYS),
            clock,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss for {} ({})", key, self.store.name());
                return None;
            }
            Err(e) => {
                warn!("Cache read for {} failed, treating as miss: {}", key, e);
                return None;
            }
        };

        if entry.version != self.version {
            info!(
                "Cached {} is version {}, expected {}; purging",
                key, entry.version, self.version
            );
            self.purge(key).await;
            return None;
        }

        let age = self.clock.now_millis() - entry.timestamp;
        if age >= self.ttl.num_milliseconds() {
            info!(
                "Cached {} is {} days old (limit {}); purging",
                key,
                age / Duration::days(1).num_milliseconds(),
                CACHE_TTL_DAYS
            );
            self.purge(key).await;
            return None;
        }

        info!("Cache hit for {} ({} bytes)", key, entry.size);
        Some(entry.data)
    }

    /// Overwrites any existing entry for `key`.
    pub async fn put(&self, key: &str, data: Bytes) -> bool {
        let entry = CacheEntry {
            key: key.to_string(),
            version: self.version.clone(),
            timestamp: self.clock.now_millis(),
            size: data.len() as u64,
            data,
        };
        let size = entry.size;

        match self.store.put(entry).await {
            Ok(()) => {
                info!("Cached {} ({} bytes, version {})", key, size, self.version);
                true
            }
            Err(e) => {
                warn!("Failed to cache {}: {}", key, e);
                false
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.purge(key).await;
    }

    /// Stored metadata, regardless of validity.
    pub async fn info(&self, key: &str) -> Option<CacheInfo> {
        match self.store.metadata(key).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to read cache metadata for {}: {}", key, e);
                None
            }
        }
    }

    async fn purge(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!("Failed to delete cache entry {}: {}", key, e);
        }
    }
}
