// src/config.rs
use crate::errors::{Result, SnapscoreError};
use crate::services::image_processor::DEFAULT_MAX_UPLOAD_BYTES;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Fs(PathBuf),
    Redis(String),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub model_url: String,
    pub model_key: String,
    pub model_version: String,
    pub cache_backend: CacheBackend,
    pub max_upload_bytes: u64,
    pub download_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let model_url = lookup("SNAPSCORE_MODEL_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SnapscoreError::Config("SNAPSCORE_MODEL_URL must be set".to_string()))?;

        let cache_backend = match get("SNAPSCORE_CACHE_BACKEND", "fs").as_str() {
            "fs" => CacheBackend::Fs(PathBuf::from(get("SNAPSCORE_CACHE_DIR", ".snapscore-cache"))),
            "redis" => CacheBackend::Redis(get("REDIS_URL", "redis://127.0.0.1:6379")),
            "memory" => CacheBackend::Memory,
            other => {
                return Err(SnapscoreError::Config(format!(
                    "SNAPSCORE_CACHE_BACKEND must be fs, redis or memory, got '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            bind_addr: get("SNAPSCORE_BIND", "0.0.0.0:8080"),
            model_url,
            model_key: get("SNAPSCORE_MODEL_KEY", "popularity-model"),
            model_version: get("SNAPSCORE_MODEL_VERSION", "1.0.0"),
            cache_backend,
            max_upload_bytes: parse(
                "SNAPSCORE_MAX_UPLOAD_BYTES",
                &get("SNAPSCORE_MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string()),
            )?,
            download_timeout: Duration::from_secs(parse(
                "SNAPSCORE_DOWNLOAD_TIMEOUT_SECS",
                &get("SNAPSCORE_DOWNLOAD_TIMEOUT_SECS", "300"),
            )?),
        })
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| {
            SnapscoreError::Config(format!("{} has invalid value '{}': {}", name, value, e))
        })
}
