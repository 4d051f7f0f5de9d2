// src/lib.rs
//! Image popularity scoring: a fixed-shape tensor pipeline feeding a
//! pre-trained model, interpretable visual heuristics, and a versioned
//! on-disk cache for the model artifact.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

pub use errors::{Result, SnapscoreError};

use std::sync::Arc;

use crate::services::{ImageProcessor, ModelLoader};

#[derive(Clone)]
pub struct AppState {
    pub model_loader: Arc<ModelLoader>,
    pub image_processor: Arc<ImageProcessor>,
}
