// src/services/inference.rs
use crate::errors::Result;
use crate::models::Tensor;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the model's single input slot.
pub const INPUT_NAME: &str = "input";
/// Name of the output slot holding the score.
pub const OUTPUT_NAME: &str = "output";

/// A constructed scoring model.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Runs the model on one named input and returns every output, flattened.
    async fn run(&self, input_name: &str, tensor: Tensor) -> Result<HashMap<String, Vec<f32>>>;
}

/// Builds an [`InferenceEngine`] from raw model bytes.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn build(&self, model: Bytes) -> Result<Arc<dyn InferenceEngine>>;
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxEngineFactory;

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use crate::errors::SnapscoreError;
    use ndarray::Array4;
    use ort::{inputs, session::Session, value::TensorRef};
    use std::sync::Mutex;

    pub struct OnnxEngineFactory;

    #[async_trait]
    impl EngineFactory for OnnxEngineFactory {
        async fn build(&self, model: Bytes) -> Result<Arc<dyn InferenceEngine>> {
            let session = tokio::task::spawn_blocking(move || {
                Session::builder()
                    .map_err(|e| {
                        SnapscoreError::ModelLoad(format!(
                            "failed to create session builder: {}",
                            e
                        ))
                    })?
                    .commit_from_memory(&model)
                    .map_err(|e| {
                        SnapscoreError::ModelLoad(format!(
                            "failed to load model from memory: {}",
                            e
                        ))
                    })
            })
            .await
            .map_err(|e| {
                SnapscoreError::ModelLoad(format!("model construction panicked: {}", e))
            })??;

            let output_names = session
                .outputs
                .iter()
                .map(|output| output.name.to_string())
                .collect();

            Ok(Arc::new(OnnxEngine {
                session: Arc::new(Mutex::new(session)),
                output_names,
            }))
        }
    }

    struct OnnxEngine {
        session: Arc<Mutex<Session>>,
        output_names: Vec<String>,
    }

    #[async_trait]
    impl InferenceEngine for OnnxEngine {
        async fn run(&self, input_name: &str, tensor: Tensor) -> Result<HashMap<String, Vec<f32>>> {
            let session = self.session.clone();
            let output_names = self.output_names.clone();
            let input_name = input_name.to_string();

            tokio::task::spawn_blocking(move || {
                let [n, c, h, w] = tensor.shape;
                let array = Array4::from_shape_vec((n, c, h, w), tensor.data)
                    .map_err(|e| SnapscoreError::Inference(format!("bad tensor shape: {}", e)))?;
                let input = TensorRef::from_array_view(array.view()).map_err(|e| {
                    SnapscoreError::Inference(format!("failed to create tensor ref: {}", e))
                })?;

                let mut session = session
                    .lock()
                    .map_err(|_| SnapscoreError::Inference("session lock poisoned".to_string()))?;
                let outputs = session
                    .run(inputs![input_name.as_str() => input])
                    .map_err(|e| SnapscoreError::Inference(format!("inference failed: {}", e)))?;

                let mut result = HashMap::new();
                for name in &output_names {
                    let values = outputs[name.as_str()]
                        .try_extract_array::<f32>()
                        .map_err(|e| {
                            SnapscoreError::Inference(format!(
                                "output '{}' is not f32: {}",
                                name, e
                            ))
                        })?
                        .iter()
                        .copied()
                        .collect();
                    result.insert(name.clone(), values);
                }
                Ok(result)
            })
            .await
            .map_err(|e| SnapscoreError::Inference(format!("inference task panicked: {}", e)))?
        }
    }
}
