// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;

use snapscore::config::{CacheBackend, Config};
use snapscore::services::{
    ArtifactCache, ArtifactStore, EngineFactory, FsStore, HttpDownloader, ImageProcessor,
    MemoryStore, ModelLoader, ModelSource, RedisService,
};
use snapscore::{AppState, SnapscoreError, handlers};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Snapscore service...");

    let config = Config::from_env()?;

    // Initialize services
    let store: Arc<dyn ArtifactStore> = match &config.cache_backend {
        CacheBackend::Fs(dir) => Arc::new(FsStore::new(dir.clone()).await?),
        CacheBackend::Redis(url) => Arc::new(RedisService::new(url).await?),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!("Model cache backend: {}", store.name());

    let cache = Arc::new(ArtifactCache::new(store, config.model_version.clone()));
    let downloader = Arc::new(HttpDownloader::new(config.download_timeout)?);
    let image_processor = Arc::new(ImageProcessor::new(config.max_upload_bytes));

    let model_loader = Arc::new(ModelLoader::new(
        ModelSource {
            url: config.model_url.clone(),
            key: config.model_key.clone(),
        },
        cache,
        downloader,
        engine_factory()?,
        image_processor.clone(),
    ));
    model_loader.spawn_load();

    let app_state = AppState {
        model_loader,
        image_processor,
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}

#[cfg(feature = "onnx")]
fn engine_factory() -> Result<Arc<dyn EngineFactory>, SnapscoreError> {
    Ok(Arc::new(snapscore::services::inference::OnnxEngineFactory))
}

#[cfg(not(feature = "onnx"))]
fn engine_factory() -> Result<Arc<dyn EngineFactory>, SnapscoreError> {
    Err(SnapscoreError::Config(
        "built without an inference runtime; rebuild with --features onnx".to_string(),
    ))
}
