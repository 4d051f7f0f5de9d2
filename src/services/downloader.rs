// src/services/downloader.rs
use crate::errors::{Result, SnapscoreError};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Content-Length, when the server sent one.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// `None` while the total size is unknown.
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some((self.downloaded as f64 / total as f64 * 100.0).min(100.0)),
            None => None,
        }
    }
}

/// Upper bound on the buffer reserved up front from Content-Length.
const MAX_PREALLOC_BYTES: u64 = 64 << 20;

pub type ProgressFn<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// Fetches a complete artifact. Dropping the returned future aborts the read.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str, on_progress: ProgressFn<'_>) -> Result<Bytes>;
}

pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SnapscoreError::Config(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str, on_progress: ProgressFn<'_>) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SnapscoreError::ModelLoad(format!("Download request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SnapscoreError::ModelLoad(format!(
                "Download of {} failed with HTTP {}",
                url,
                response.status()
            )));
        }

        let total = response.content_length();
        info!(
            "Downloading {} ({})",
            url,
            total.map_or_else(|| "unknown size".to_string(), |t| format!("{} bytes", t))
        );

        let reserve = total.unwrap_or(0).min(MAX_PREALLOC_BYTES);
        let mut buffer = BytesMut::with_capacity(reserve as usize);
        let mut last_decile = 0;
        on_progress(DownloadProgress { downloaded: 0, total });

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| SnapscoreError::ModelLoad(format!("Download interrupted: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            let progress = DownloadProgress {
                downloaded: buffer.len() as u64,
                total,
            };
            if let Some(pct) = progress.percent() {
                let decile = (pct / 10.0) as u32;
                if decile > last_decile {
                    last_decile = decile;
                    debug!("Downloaded {:.0}% of {}", pct, url);
                }
            }
            on_progress(progress);
        }

        if let Some(expected) = total {
            if buffer.len() as u64 != expected {
                return Err(SnapscoreError::ModelLoad(format!(
                    "Download of {} ended after {} of {} bytes",
                    url,
                    buffer.len(),
                    expected
                )));
            }
        }

        Ok(buffer.freeze())
    }
}
