// src/services/mod.rs
pub mod artifact_cache;
pub mod downloader;
pub mod feature_analyzer;
pub mod fs_store;
pub mod image_processor;
pub mod inference;
pub mod insight_composer;
pub mod model_loader;
pub mod redis_service;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact_cache::{ArtifactCache, ArtifactStore, MemoryStore};
pub use downloader::{Downloader, HttpDownloader};
pub use fs_store::FsStore;
pub use image_processor::ImageProcessor;
pub use inference::{EngineFactory, InferenceEngine};
pub use model_loader::{ModelLoader, ModelSource, ModelStatus};
pub use redis_service::RedisService;
