// src/handlers.rs
use crate::services::feature_analyzer::analyze_or_default;
use crate::services::image_processor::format_file_size;
use crate::services::insight_composer::compose;
use crate::services::ModelStatus;
use crate::{AppState, errors::SnapscoreError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/analyze", web::post().to(analyze_image))
            .route("/model/status", web::get().to(model_status))
            .route("/model/reload", web::post().to(reload_model))
            .route("/model/cache", web::get().to(cache_info))
            .route("/model/cache", web::delete().to(invalidate_cache)),
    )
    .route("/health", web::get().to(health_check));
}

/// An uploaded image file before decoding.
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

pub async fn analyze_image(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let limit = data.image_processor.max_upload_bytes();

    while let Some(mut field) = payload.try_next().await? {
        let Some(filename) = field.content_disposition().get_filename().map(str::to_string) else {
            continue;
        };

        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        // Collect image data
        let mut image_data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            image_data.extend_from_slice(&chunk);
            if image_data.len() as u64 > limit {
                data.image_processor
                    .validate_upload(&content_type, image_data.len() as u64)?;
            }
        }

        let result = run_analysis(
            &data,
            Upload {
                filename,
                content_type,
                data: image_data,
            },
        )
        .await?;

        return Ok(HttpResponse::Ok().json(&result));
    }

    Err(SnapscoreError::Validation("No image file provided".to_string()).into())
}

/// Decodes the upload once, then scores it and measures its features
/// concurrently.
pub async fn run_analysis(
    state: &AppState,
    upload: Upload,
) -> Result<AnalysisResult, SnapscoreError> {
    let start = Instant::now();
    let size = upload.data.len() as u64;

    state
        .image_processor
        .validate_upload(&upload.content_type, size)?;

    let loader = &state.model_loader;
    if !loader.is_ready() {
        // lazy start on first use; a failed load waits for an explicit reload
        loader.spawn_load();
        return Err(SnapscoreError::NotReady);
    }

    let processor = Arc::clone(&state.image_processor);
    let bytes = upload.data;
    let buffer = tokio::task::spawn_blocking(move || processor.decode(&bytes))
        .await
        .map_err(|e| SnapscoreError::Decode(format!("Decode task failed: {}", e)))??;
    let buffer = Arc::new(buffer);

    let analysis_input = Arc::clone(&buffer);
    let (score, features) = tokio::join!(
        loader.predict(buffer),
        tokio::task::spawn_blocking(move || analyze_or_default(&analysis_input)),
    );
    let score = score?;
    let features =
        features.map_err(|e| SnapscoreError::Analysis(format!("Analysis task failed: {}", e)))?;

    let insights = compose(score, &features);

    Ok(AnalysisResult {
        id: Uuid::new_v4(),
        score,
        category: insights.category,
        file: FileInfo {
            filename: upload.filename,
            content_type: upload.content_type,
            size_bytes: size,
            size_display: format_file_size(size),
        },
        features,
        insights,
        model_version: loader.model_version().to_string(),
        analyzed_at: chrono::Utc::now(),
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

pub async fn model_status(data: web::Data<AppState>) -> HttpResponse {
    let loader = &data.model_loader;
    HttpResponse::Ok().json(serde_json::json!({
        "model_version": loader.model_version(),
        "status": loader.status(),
    }))
}

pub async fn reload_model(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let loader = &data.model_loader;
    loader.retry().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "model_version": loader.model_version(),
        "status": loader.status(),
    })))
}

pub async fn cache_info(data: web::Data<AppState>) -> HttpResponse {
    match data.model_loader.cache_info().await {
        Some(info) => HttpResponse::Ok().json(info),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Not cached",
            "message": "No cached model artifact"
        })),
    }
}

pub async fn invalidate_cache(data: web::Data<AppState>) -> HttpResponse {
    data.model_loader.invalidate_cache().await;
    HttpResponse::NoContent().finish()
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "snapscore",
        "version": env!("CARGO_PKG_VERSION"),
        "model_ready": matches!(data.model_loader.status(), ModelStatus::Ready { .. }),
    }))
}
