// src/services/model_loader.rs
use crate::errors::{Result, SnapscoreError};
use crate::models::{CacheInfo, PixelBuffer, Tensor};
use crate::services::artifact_cache::ArtifactCache;
use crate::services::downloader::{DownloadProgress, Downloader};
use crate::services::image_processor::{ImageProcessor, TENSOR_LEN, TENSOR_SHAPE};
use crate::services::inference::{EngineFactory, INPUT_NAME, InferenceEngine, OUTPUT_NAME};
use bytes::Bytes;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinError;

#[derive(Debug, Clone)]
pub struct ModelSource {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum LoadProgress {
    CheckingCache,
    Downloading {
        downloaded: u64,
        total: Option<u64>,
        /// Absent while the download size is unknown.
        percent: Option<f64>,
    },
    Initializing,
}

impl From<DownloadProgress> for LoadProgress {
    fn from(p: DownloadProgress) -> Self {
        LoadProgress::Downloading {
            downloaded: p.downloaded,
            total: p.total,
            percent: p.percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelStatus {
    Unloaded,
    Loading { progress: LoadProgress },
    Ready { origin: ArtifactOrigin },
    Failed { reason: String },
}

/// Puts the status back to `Unloaded` if a load is dropped mid-flight.
struct AbandonGuard<'a> {
    status: &'a watch::Sender<ModelStatus>,
    armed: bool,
}

impl AbandonGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Model load abandoned before completion");
            self.status.send_replace(ModelStatus::Unloaded);
        }
    }
}

/// Owns the scoring model for the process lifetime.
///
/// `Unloaded -> Loading -> Ready | Failed`; a failed load can be retried.
/// Loads are single-flight: callers that arrive while an attempt is running
/// wait for it and share its outcome. `predict` never waits for a load and
/// fails with `NotReady` instead.
pub struct ModelLoader {
    source: ModelSource,
    cache: Arc<ArtifactCache>,
    downloader: Arc<dyn Downloader>,
    factory: Arc<dyn EngineFactory>,
    processor: Arc<ImageProcessor>,
    engine: RwLock<Option<Arc<dyn InferenceEngine>>>,
    status: watch::Sender<ModelStatus>,
    load_lock: Mutex<()>,
    completed_loads: AtomicU64,
}

impl ModelLoader {
    pub fn new(
        source: ModelSource,
        cache: Arc<ArtifactCache>,
        downloader: Arc<dyn Downloader>,
        factory: Arc<dyn EngineFactory>,
        processor: Arc<ImageProcessor>,
    ) -> Self {
        let (status, _) = watch::channel(ModelStatus::Unloaded);
        Self {
            source,
            cache,
            downloader,
            factory,
            processor,
            engine: RwLock::new(None),
            status,
            load_lock: Mutex::new(()),
            completed_loads: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> ModelStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModelStatus> {
        self.status.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.status.borrow(), ModelStatus::Ready { .. })
    }

    pub fn model_version(&self) -> &str {
        self.cache.version()
    }

    /// Starts a load in the background if nothing has been attempted yet.
    /// A failed model stays failed until [`ModelLoader::retry`] is called.
    pub fn spawn_load(self: &Arc<Self>) {
        if !matches!(*self.status.borrow(), ModelStatus::Unloaded) {
            return;
        }

        let loader = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = loader.load().await {
                error!("Background model load failed: {}", e);
            }
        });
    }

    /// Explicit retry entry point after a failed load.
    pub async fn retry(&self) -> Result<()> {
        self.load().await
    }

    pub async fn load(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let seen = self.completed_loads.load(Ordering::Acquire);
        let _lock = self.load_lock.lock().await;

        if self.completed_loads.load(Ordering::Acquire) != seen {
            // an attempt finished while we were queued; share its outcome
            return match self.status() {
                ModelStatus::Ready { .. } => Ok(()),
                ModelStatus::Failed { reason } => Err(SnapscoreError::ModelLoad(reason)),
                _ => Err(SnapscoreError::NotReady),
            };
        }
        if self.is_ready() {
            return Ok(());
        }

        let guard = AbandonGuard {
            status: &self.status,
            armed: true,
        };

        let outcome = self.load_engine().await;
        if let Ok((engine, _)) = &outcome {
            *self.engine.write().await = Some(Arc::clone(engine));
        }
        guard.disarm();

        let result = match outcome {
            Ok((_, origin)) => {
                info!("Model {} ready (from {:?})", self.source.key, origin);
                self.status.send_replace(ModelStatus::Ready { origin });
                Ok(())
            }
            Err(e) => {
                error!("Model {} failed to load: {}", self.source.key, e);
                let reason = match &e {
                    SnapscoreError::ModelLoad(reason) => reason.clone(),
                    other => other.to_string(),
                };
                self.status.send_replace(ModelStatus::Failed { reason });
                Err(e)
            }
        };
        self.completed_loads.fetch_add(1, Ordering::Release);
        result
    }

    async fn load_engine(&self) -> Result<(Arc<dyn InferenceEngine>, ArtifactOrigin)> {
        self.set_progress(LoadProgress::CheckingCache);

        let (bytes, origin) = match self.cache.get(&self.source.key).await {
            Some(bytes) => (bytes, ArtifactOrigin::Cache),
            None => (self.download().await?, ArtifactOrigin::Network),
        };

        if origin == ArtifactOrigin::Network {
            self.cache.put(&self.source.key, bytes.clone()).await;
        }

        self.set_progress(LoadProgress::Initializing);
        match self.factory.build(bytes).await {
            Ok(engine) => Ok((engine, origin)),
            Err(e) => {
                warn!(
                    "Engine rejected {} artifact for {}, invalidating cache entry",
                    match origin {
                        ArtifactOrigin::Cache => "cached",
                        ArtifactOrigin::Network => "downloaded",
                    },
                    self.source.key
                );
                self.cache.invalidate(&self.source.key).await;
                Err(match e {
                    SnapscoreError::ModelLoad(_) => e,
                    other => SnapscoreError::ModelLoad(other.to_string()),
                })
            }
        }
    }

    async fn download(&self) -> Result<Bytes> {
        self.set_progress(LoadProgress::from(DownloadProgress {
            downloaded: 0,
            total: None,
        }));
        let report = |p: DownloadProgress| self.set_progress(LoadProgress::from(p));
        let bytes = self.downloader.fetch(&self.source.url, &report).await?;
        info!("Downloaded {} ({} bytes)", self.source.key, bytes.len());
        Ok(bytes)
    }

    fn set_progress(&self, progress: LoadProgress) {
        self.status.send_replace(ModelStatus::Loading { progress });
    }

    /// Scores an image. Fails with `NotReady` until a load has succeeded.
    pub async fn predict(&self, buffer: Arc<PixelBuffer>) -> Result<f64> {
        let engine = self.ready_engine().await?;

        let processor = Arc::clone(&self.processor);
        let tensor = tokio::task::spawn_blocking(move || processor.to_tensor(&buffer))
            .await
            .map_err(preprocessing_failed)??;

        Self::score(engine.as_ref(), tensor).await
    }

    async fn ready_engine(&self) -> Result<Arc<dyn InferenceEngine>> {
        if !self.is_ready() {
            return Err(SnapscoreError::NotReady);
        }
        self.engine.read().await.clone().ok_or(SnapscoreError::NotReady)
    }

    async fn score(engine: &dyn InferenceEngine, tensor: Tensor) -> Result<f64> {
        if tensor.shape != TENSOR_SHAPE || tensor.len() != TENSOR_LEN {
            return Err(SnapscoreError::Inference(format!(
                "tensor shape {:?} with {} values does not match {:?}",
                tensor.shape,
                tensor.len(),
                TENSOR_SHAPE
            )));
        }

        let outputs = engine.run(INPUT_NAME, tensor).await?;
        let score = outputs
            .get(OUTPUT_NAME)
            .and_then(|values| values.first())
            .ok_or_else(|| {
                SnapscoreError::Inference(format!("model returned no '{}' value", OUTPUT_NAME))
            })?;

        Ok(*score as f64)
    }

    pub async fn cache_info(&self) -> Option<CacheInfo> {
        self.cache.info(&self.source.key).await
    }

    /// Drops the cached artifact; the loaded engine stays in use.
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate(&self.source.key).await;
    }
}

/// A panicked preprocessing task is a bug, not a bad image.
fn preprocessing_failed(e: JoinError) -> SnapscoreError {
    SnapscoreError::Inference(format!("Preprocessing task failed: {}", e))
}
