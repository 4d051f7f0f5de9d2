// src/services/testing.rs
//! Test doubles for the download, storage and inference boundaries.

use crate::errors::{Result, SnapscoreError};
use crate::models::{CacheEntry, CacheInfo, Tensor};
use crate::services::artifact_cache::{ArtifactStore, MemoryStore};
use crate::services::downloader::{DownloadProgress, Downloader, ProgressFn};
use crate::services::inference::{EngineFactory, InferenceEngine, OUTPUT_NAME};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeDownloader {
    body: Bytes,
    delay: Duration,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeDownloader {
    pub fn new(body: &'static [u8]) -> Self {
        Self {
            body: Bytes::from_static(body),
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn fetch(&self, _url: &str, on_progress: ProgressFn<'_>) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = Some(self.body.len() as u64);

        on_progress(DownloadProgress {
            downloaded: self.body.len() as u64 / 2,
            total,
        });
        tokio::time::sleep(self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(SnapscoreError::ModelLoad("HTTP 503".to_string()));
        }

        on_progress(DownloadProgress {
            downloaded: self.body.len() as u64,
            total,
        });
        tokio::time::sleep(self.delay).await;

        Ok(self.body.clone())
    }
}

/// Records the last input it saw and answers with a fixed score.
pub struct FakeEngine {
    score: Option<f32>,
    last_input: Mutex<Option<(String, [usize; 4], f64)>>,
}

impl FakeEngine {
    /// Input name, tensor shape and the sum of the first channel.
    pub fn last_input(&self) -> Option<(String, [usize; 4], f64)> {
        self.last_input.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    async fn run(&self, input_name: &str, tensor: Tensor) -> Result<HashMap<String, Vec<f32>>> {
        let red_sum = tensor.channel(0).iter().map(|&v| v as f64).sum();
        *self.last_input.lock().unwrap() = Some((input_name.to_string(), tensor.shape, red_sum));

        let mut outputs = HashMap::new();
        if let Some(score) = self.score {
            outputs.insert(OUTPUT_NAME.to_string(), vec![score]);
        }
        Ok(outputs)
    }
}

pub struct FakeFactory {
    engine: Arc<FakeEngine>,
    reject: bool,
    builds: AtomicUsize,
    last_model: Mutex<Option<Bytes>>,
}

impl FakeFactory {
    fn with(score: Option<f32>, reject: bool) -> Self {
        Self {
            engine: Arc::new(FakeEngine {
                score,
                last_input: Mutex::new(None),
            }),
            reject,
            builds: AtomicUsize::new(0),
            last_model: Mutex::new(None),
        }
    }

    pub fn scoring(score: f32) -> Self {
        Self::with(Some(score), false)
    }

    pub fn without_output() -> Self {
        Self::with(None, false)
    }

    pub fn rejecting() -> Self {
        Self::with(Some(0.0), true)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn last_model(&self) -> Option<Bytes> {
        self.last_model.lock().unwrap().clone()
    }

    pub fn engine(&self) -> Arc<FakeEngine> {
        Arc::clone(&self.engine)
    }
}

#[async_trait]
impl EngineFactory for FakeFactory {
    async fn build(&self, model: Bytes) -> Result<Arc<dyn InferenceEngine>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_model.lock().unwrap() = Some(model);
        if self.reject {
            return Err(SnapscoreError::ModelLoad("not an ONNX model".to_string()));
        }
        Ok(self.engine.clone())
    }
}

/// Memory store that counts writes.
pub struct CountingStore {
    inner: MemoryStore,
    puts: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
        }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.inner.get(key).await
    }

    async fn metadata(&self, key: &str) -> Result<Option<CacheInfo>> {
        self.inner.metadata(key).await
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(entry).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}
