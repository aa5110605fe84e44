//! Error Handling Module
//!
//! Defines the error taxonomy of the classification pipeline.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the classification pipeline
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The model artifact is missing or could not be deserialized
    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// The uploaded bytes are not a recognized or intact image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Shape mismatch or failure inside the forward pass
    #[error("Inference error: {0}")]
    Inference(String),

    /// The arg-max index has no category attached to it
    #[error("No category for model output index {0}")]
    UnknownCategory(usize),

    /// The temporary upload could not be removed
    #[error("Failed to remove upload '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        ClassifierError::Decode(err.to_string())
    }
}

/// Convenience Result type for pipeline operations
pub type Result<T> = std::result::Result<T, ClassifierError>;
