//! Inference engine
//!
//! Runs one forward pass through the cached classifier. The forward pass is
//! CPU bound and is moved onto the blocking thread pool.

use std::time::Instant;

use tracing::debug;

use crate::inference::labels::Category;
use crate::inference::ImageTensor;
use crate::model::ModelCache;
use crate::utils::{format_millis, ClassifierError, Result};

pub struct InferenceEngine {
    cache: ModelCache,
}

impl InferenceEngine {
    pub fn new(cache: ModelCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Classify one tensor, loading the model first if needed.
    ///
    /// Returns one probability per `Category`, in `Category::ALL` order.
    pub async fn predict(&self, tensor: ImageTensor) -> Result<Vec<f32>> {
        let model = self.cache.ensure_loaded().await?;

        if tensor.shape() != model.input_shape() {
            return Err(ClassifierError::Inference(format!(
                "tensor shape {:?} does not match model input {:?}",
                tensor.shape(),
                model.input_shape()
            )));
        }

        let start = Instant::now();
        let probabilities = tokio::task::spawn_blocking(move || model.forward(&tensor))
            .await
            .map_err(|e| ClassifierError::Inference(format!("inference task failed: {}", e)))??;

        if probabilities.len() != Category::COUNT {
            return Err(ClassifierError::Inference(format!(
                "model produced {} scores for {} categories",
                probabilities.len(),
                Category::COUNT
            )));
        }

        debug!("Forward pass took {}", format_millis(start.elapsed()));
        Ok(probabilities)
    }
}
