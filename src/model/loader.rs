//! Model artifact loading
//!
//! Reads a `CompactRecorder` artifact into a `CornClassifier` and wraps it
//! behind the `Classifier` trait. An optional JSON sidecar next to the
//! artifact (same stem, `.json` extension) overrides the default
//! architecture config.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use burn::config::Config;
use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::{backend::Backend, Tensor, TensorData};
use tracing::{debug, info};

use crate::backend::{default_device, InferenceBackend};
use crate::inference::ImageTensor;
use crate::model::cnn::{CornClassifier, CornClassifierConfig};
use crate::model::Classifier;
use crate::utils::{format_millis, ClassifierError, Result};

/// Something that can produce the shared classifier instance.
///
/// `load` does blocking disk and CPU work; the cache runs it on the blocking
/// thread pool.
pub trait ModelLoader: Send + Sync + 'static {
    /// Location of the artifact, used in errors and logs
    fn artifact_path(&self) -> &Path;

    fn load(&self) -> Result<Arc<dyn Classifier>>;
}

/// Loads a `CornClassifier` from a Burn `CompactRecorder` file
#[derive(Debug, Clone)]
pub struct BurnModelLoader {
    path: PathBuf,
}

impl BurnModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        // The recorder always appends its own extension.
        let path = path.into().with_extension("mpk");
        Self { path }
    }

    /// Path of the optional architecture sidecar
    pub fn config_path(&self) -> PathBuf {
        self.path.with_extension("json")
    }

    fn load_error(&self, reason: impl Into<String>) -> ClassifierError {
        ClassifierError::ModelLoad {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn resolve_config(&self) -> Result<CornClassifierConfig> {
        let config_path = self.config_path();
        if !config_path.exists() {
            return Ok(CornClassifierConfig::new());
        }

        debug!("Reading model config from {:?}", config_path);
        CornClassifierConfig::load(&config_path)
            .map_err(|e| self.load_error(format!("invalid config {:?}: {:?}", config_path, e)))
    }
}

impl ModelLoader for BurnModelLoader {
    fn artifact_path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Arc<dyn Classifier>> {
        if !self.path.exists() {
            return Err(self.load_error("file not found"));
        }

        let start = Instant::now();
        let config = self.resolve_config()?;
        let device = default_device();

        let model = CornClassifier::<InferenceBackend>::new(&config, &device)
            .load_file(self.path.clone(), &CompactRecorder::new(), &device)
            .map_err(|e| self.load_error(format!("{:?}", e)))?;

        info!(
            "Loaded {}-class model from {:?} in {}",
            model.num_classes(),
            self.path,
            format_millis(start.elapsed())
        );

        Ok(Arc::new(BurnClassifier::new(model, &config, device)))
    }
}

/// `Classifier` backed by a Burn module
///
/// Burn modules are only guaranteed `Send`, so the module sits behind a
/// mutex. Parameters are reference counted, which makes the per-call clone
/// cheap and keeps the lock out of the forward pass.
#[derive(Debug)]
pub struct BurnClassifier<B: Backend> {
    model: Mutex<CornClassifier<B>>,
    device: B::Device,
    input_shape: [usize; 4],
    num_classes: usize,
}

impl<B: Backend> BurnClassifier<B> {
    pub fn new(model: CornClassifier<B>, config: &CornClassifierConfig, device: B::Device) -> Self {
        Self {
            num_classes: model.num_classes(),
            model: Mutex::new(model),
            device,
            input_shape: config.input_shape(),
        }
    }
}

impl<B: Backend> Classifier for BurnClassifier<B> {
    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    fn num_outputs(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, tensor: &ImageTensor) -> Result<Vec<f32>> {
        if tensor.shape() != self.input_shape {
            return Err(ClassifierError::Inference(format!(
                "expected input shape {:?}, got {:?}",
                self.input_shape,
                tensor.shape()
            )));
        }

        let model = self
            .model
            .lock()
            .map_err(|_| ClassifierError::Inference("model lock poisoned".to_string()))?
            .clone();

        // NHWC -> NCHW
        let input = Tensor::<B, 4>::from_data(
            TensorData::new(tensor.as_slice().to_vec(), tensor.shape()),
            &self.device,
        )
        .permute([0, 3, 1, 2]);

        let output = model.forward_softmax(input);

        let probabilities: Vec<f32> = output
            .into_data()
            .to_vec()
            .map_err(|e| ClassifierError::Inference(format!("failed to read output: {:?}", e)))?;

        Ok(probabilities)
    }
}
