// src/services/fs_store.rs
use crate::errors::{Result, SnapscoreError};
use crate::models::{CacheEntry, CacheInfo};
use crate::services::artifact_cache::ArtifactStore;
use async_trait::async_trait;
use bytes::Bytes;
use log::warn;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores each entry as `<key>.bin` (blob) plus `<key>.json` (metadata).
///
/// The metadata file is written last and removed first, so a reader never
/// sees metadata without a complete blob behind it.
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            SnapscoreError::Storage(format!("Cannot create cache dir {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    fn file_stem(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", Self::file_stem(key)))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::file_stem(key)))
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| {
                SnapscoreError::Storage(format!("Write {} failed: {}", tmp.display(), e))
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| {
                SnapscoreError::Storage(format!("Rename to {} failed: {}", path.display(), e))
            })
    }

    async fn remove_if_present(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapscoreError::Storage(format!(
                "Remove {} failed: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(info) = self.metadata(key).await? else {
            return Ok(None);
        };

        let data = match tokio::fs::read(self.blob_path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Cache blob for {} is missing, dropping metadata", key);
                self.delete(key).await?;
                return Ok(None);
            }
            Err(e) => {
                return Err(SnapscoreError::Storage(format!(
                    "Read blob {} failed: {}",
                    key, e
                )));
            }
        };

        if data.len() as u64 != info.size {
            warn!(
                "Cache blob for {} holds {} bytes, metadata says {}; dropping entry",
                key,
                data.len(),
                info.size
            );
            self.delete(key).await?;
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            key: info.key,
            version: info.version,
            timestamp: info.timestamp,
            size: info.size,
            data: Bytes::from(data),
        }))
    }

    async fn metadata(&self, key: &str) -> Result<Option<CacheInfo>> {
        let raw = match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SnapscoreError::Storage(format!(
                    "Read metadata {} failed: {}",
                    key, e
                )));
            }
        };

        let info: CacheInfo = serde_json::from_slice(&raw)?;
        if info.key != key {
            // another key sanitized to the same file name
            warn!("Cache file for {} belongs to key {}, ignoring", key, info.key);
            return Ok(None);
        }
        Ok(Some(info))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let meta = serde_json::to_vec(&entry.info())?;
        // drop stale metadata before the blob changes underneath it
        Self::remove_if_present(&self.meta_path(&entry.key)).await?;
        Self::write_atomic(&self.blob_path(&entry.key), &entry.data).await?;
        Self::write_atomic(&self.meta_path(&entry.key), &meta).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::remove_if_present(&self.meta_path(key)).await?;
        Self::remove_if_present(&self.blob_path(key)).await
    }

    fn name(&self) -> &str {
        "fs"
    }
}
