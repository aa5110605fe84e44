//! Application state for the classifier server
//!
//! Owns the classification pipeline, and through it the single model
//! instance shared by every request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use cornleaf::model::DEFAULT_MODEL_PATH;
use cornleaf::upload::DEFAULT_UPLOAD_DIR;
use cornleaf::{
    BurnModelLoader, ClassificationPipeline, ImagePreprocessor, ModelCache, ModelLoader,
    PixelScaling,
};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Trained model artifact
    pub model_path: PathBuf,
    /// Directory for transient uploads
    pub upload_dir: PathBuf,
    /// Pixel value mapping applied before inference
    pub pixel_scaling: PixelScaling,
    /// Maximum request body size in MiB
    pub max_upload_mb: usize,
    /// Load the model at startup instead of on the first request
    pub preload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            pixel_scaling: PixelScaling::default(),
            max_upload_mb: 10,
            preload: false,
        }
    }
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Upload, preprocess, infer, resolve
    pub pipeline: ClassificationPipeline,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    /// State backed by the Burn artifact at `config.model_path`
    pub fn new(config: ServerConfig) -> Self {
        let loader = BurnModelLoader::new(&config.model_path);
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: ServerConfig, loader: impl ModelLoader) -> Self {
        let pipeline = ClassificationPipeline::new(
            cornleaf::UploadManager::new(&config.upload_dir),
            ImagePreprocessor::new().with_scaling(config.pixel_scaling),
            ModelCache::new(loader),
        );

        Self {
            config,
            pipeline,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
