//! # Corn Leaf Classifier
//!
//! Serves a pretrained corn leaf disease classifier built with the Burn
//! framework.
//!
//! ## Modules
//!
//! - `model`: CNN architecture, artifact loading and the process-wide model cache
//! - `inference`: preprocessing, forward pass and label resolution
//! - `upload`: scoped lifecycle of the temporary uploaded image
//! - `pipeline`: the per-request stage sequence tying the above together
//! - `utils`: logging and the error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cornleaf::{BurnModelLoader, ClassificationPipeline, ImagePreprocessor, ModelCache, UploadManager};
//!
//! let cache = ModelCache::new(BurnModelLoader::new("model/corn_classifier.mpk"));
//! let pipeline = ClassificationPipeline::new(UploadManager::new("uploads"), ImagePreprocessor::new(), cache);
//! let prediction = pipeline.classify("req-1", image_bytes).await.result?;
//! println!("{}: {}", prediction.category, prediction.explanation);
//! ```

pub mod backend;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod upload;
pub mod utils;

// Re-export commonly used items for convenience
pub use inference::{
    Category, ImagePreprocessor, ImageTensor, InferenceEngine, LabelResolver, PixelScaling,
    PredictionResult,
};
pub use model::{BurnModelLoader, Classifier, CornClassifier, CornClassifierConfig, ModelCache, ModelLoader};
pub use pipeline::{ClassificationPipeline, Stage};
pub use upload::{UploadManager, UploadOutcome};
pub use utils::error::{ClassifierError, Result};

/// Number of corn leaf categories
pub const NUM_CLASSES: usize = Category::COUNT;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
