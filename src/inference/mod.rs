//! Inference module: preprocessing, forward pass and label mapping
//!
//! This module provides:
//! - `ImagePreprocessor`: encoded bytes to a `[1, 224, 224, 3]` tensor
//! - `InferenceEngine`: forward pass through the cached classifier
//! - `LabelResolver`: probability vector to `Category` plus explanation

pub mod engine;
pub mod labels;
pub mod preprocess;

// Re-export main types for convenience
pub use engine::InferenceEngine;
pub use labels::{argmax, Category, LabelResolver, PredictionResult};
pub use preprocess::{ImagePreprocessor, ImageTensor, PixelScaling, INPUT_SHAPE, INPUT_SIZE};
