// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapscoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapscoreError {
    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Image analysis error: {0}")]
    Analysis(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Model is not ready yet")]
    NotReady,

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SnapscoreError {
    fn kind(&self) -> &'static str {
        match self {
            SnapscoreError::Decode(_) => "Image decode error",
            SnapscoreError::Analysis(_) => "Image analysis error",
            SnapscoreError::ModelLoad(_) => "Model unavailable",
            SnapscoreError::NotReady => "Model loading",
            SnapscoreError::Inference(_) => "Inference error",
            SnapscoreError::Storage(_) => "Storage error",
            SnapscoreError::Serialization(_) => "Data processing error",
            SnapscoreError::Validation(_) => "Validation error",
            SnapscoreError::Config(_) => "Configuration error",
        }
    }
}

impl ResponseError for SnapscoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            SnapscoreError::Decode(_) | SnapscoreError::Validation(_) => StatusCode::BAD_REQUEST,
            SnapscoreError::NotReady | SnapscoreError::ModelLoad(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SnapscoreError::Analysis(_)
            | SnapscoreError::Inference(_)
            | SnapscoreError::Storage(_)
            | SnapscoreError::Serialization(_)
            | SnapscoreError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string()
        }))
    }
}

impl From<serde_json::Error> for SnapscoreError {
    fn from(e: serde_json::Error) -> Self {
        SnapscoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_map_to_bad_request() {
        assert_eq!(
            SnapscoreError::Decode("truncated".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SnapscoreError::Validation("too big".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_ready_is_service_unavailable() {
        assert_eq!(SnapscoreError::NotReady.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            SnapscoreError::ModelLoad("404".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn inference_errors_are_internal() {
        let err = SnapscoreError::Inference("bad shape".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Inference error: bad shape");
    }
}
