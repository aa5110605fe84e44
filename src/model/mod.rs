//! Model module: CNN architecture, artifact loading and the process-wide cache
//!
//! This module provides:
//! - The `CornClassifier` CNN built with Burn
//! - `ModelLoader` implementations that read a trained artifact from disk
//! - `ModelCache`, which owns the single shared classifier instance

pub mod cache;
pub mod cnn;
pub mod loader;

use crate::inference::ImageTensor;
use crate::utils::Result;

// Re-export main types for convenience
pub use cache::ModelCache;
pub use cnn::{CornClassifier, CornClassifierConfig};
pub use loader::{BurnClassifier, BurnModelLoader, ModelLoader};

/// Default location of the trained model artifact
pub const DEFAULT_MODEL_PATH: &str = "model/corn_classifier.mpk";

/// A loaded, read-only classifier shared by all requests.
pub trait Classifier: Send + Sync {
    /// NHWC shape the classifier accepts
    fn input_shape(&self) -> [usize; 4];

    /// Length of the probability vector produced by `forward`
    fn num_outputs(&self) -> usize;

    /// Run one forward pass and return per-class probabilities.
    fn forward(&self, tensor: &ImageTensor) -> Result<Vec<f32>>;
}
