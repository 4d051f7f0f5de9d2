// src/services/redis_service.rs
use crate::errors::{Result, SnapscoreError};
use crate::models::{CacheEntry, CacheInfo};
use crate::services::artifact_cache::ArtifactStore;
use async_trait::async_trait;
use bytes::Bytes;
use redis::Client;

/// Sorted set of cached keys scored by write timestamp.
const INDEX_KEY: &str = "artifact:index";

/// Redis-backed artifact store. Each entry is a hash
/// `artifact:<key>` with `version`, `timestamp`, `size` and `data` fields.
pub struct RedisService {
    client: Client,
}

type EntryFields = (Option<String>, Option<i64>, Option<u64>);
type EntryRow = (Option<String>, Option<i64>, Option<u64>, Option<Vec<u8>>);

impl RedisService {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| SnapscoreError::Storage(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| SnapscoreError::Storage(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| SnapscoreError::Storage(e.to_string()))?;

        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::Connection> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| SnapscoreError::Storage(e.to_string()))
    }

    fn entry_key(key: &str) -> String {
        format!("artifact:{}", key)
    }

    fn to_info(key: &str, fields: EntryFields) -> Option<CacheInfo> {
        match fields {
            (Some(version), Some(timestamp), Some(size)) => Some(CacheInfo {
                key: key.to_string(),
                version,
                timestamp,
                size,
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl ArtifactStore for RedisService {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.connection().await?;

        let (version, timestamp, size, data): EntryRow =
            redis::cmd("HMGET")
                .arg(Self::entry_key(key))
                .arg("version")
                .arg("timestamp")
                .arg("size")
                .arg("data")
                .query_async(&mut conn)
                .await
                .map_err(|e| SnapscoreError::Storage(format!("Artifact read failed: {}", e)))?;

        let (Some(info), Some(data)) = (Self::to_info(key, (version, timestamp, size)), data) else {
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            key: info.key,
            version: info.version,
            timestamp: info.timestamp,
            size: info.size,
            data: Bytes::from(data),
        }))
    }

    async fn metadata(&self, key: &str) -> Result<Option<CacheInfo>> {
        let mut conn = self.connection().await?;

        let fields: EntryFields = redis::cmd("HMGET")
            .arg(Self::entry_key(key))
            .arg("version")
            .arg("timestamp")
            .arg("size")
            .query_async(&mut conn)
            .await
            .map_err(|e| SnapscoreError::Storage(format!("Metadata read failed: {}", e)))?;

        Ok(Self::to_info(key, fields))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let mut conn = self.connection().await?;
        let entry_key = Self::entry_key(&entry.key);

        redis::pipe()
            .atomic()
            .del(&entry_key)
            .ignore()
            .hset(&entry_key, "version", &entry.version)
            .ignore()
            .hset(&entry_key, "timestamp", entry.timestamp)
            .ignore()
            .hset(&entry_key, "size", entry.size)
            .ignore()
            .hset(&entry_key, "data", entry.data.as_ref())
            .ignore()
            .zadd(INDEX_KEY, &entry.key, entry.timestamp)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| SnapscoreError::Storage(format!("Artifact write failed: {}", e)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;

        redis::pipe()
            .atomic()
            .del(Self::entry_key(key))
            .ignore()
            .zrem(INDEX_KEY, key)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| SnapscoreError::Storage(format!("Artifact delete failed: {}", e)))
    }

    fn name(&self) -> &str {
        "redis"
    }
}
