//! Classification pipeline
//!
//! Runs one upload through the stages in fixed order:
//! received -> preprocessed -> inferred -> resolved. Any failure ends the
//! run; the upload is removed on every path and the model cache is never
//! left holding a failed load.

use std::path::PathBuf;

use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::inference::{ImagePreprocessor, InferenceEngine, LabelResolver, PredictionResult};
use crate::model::ModelCache;
use crate::upload::{UploadManager, UploadOutcome};
use crate::utils::{ClassifierError, Result};

/// Request lifecycle stages, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Preprocessed,
    Inferred,
    Resolved,
    Responded,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Preprocessed => "preprocessed",
            Stage::Inferred => "inferred",
            Stage::Resolved => "resolved",
            Stage::Responded => "responded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct ClassificationPipeline {
    uploads: UploadManager,
    preprocessor: ImagePreprocessor,
    engine: InferenceEngine,
    resolver: LabelResolver,
}

impl ClassificationPipeline {
    pub fn new(uploads: UploadManager, preprocessor: ImagePreprocessor, cache: ModelCache) -> Self {
        Self {
            uploads,
            preprocessor,
            engine: InferenceEngine::new(cache),
            resolver: LabelResolver::new(),
        }
    }

    pub fn uploads(&self) -> &UploadManager {
        &self.uploads
    }

    pub fn model_cache(&self) -> &ModelCache {
        self.engine.cache()
    }

    /// Classify one uploaded image.
    ///
    /// The returned outcome carries the classification result and, separately,
    /// whether the temporary upload was removed.
    pub async fn classify(&self, request_id: &str, bytes: Vec<u8>) -> UploadOutcome<PredictionResult> {
        debug!(request_id, stage = %Stage::Received, size = bytes.len());

        let outcome = self
            .uploads
            .with_upload(bytes, |path| self.run_stages(request_id, path))
            .await;

        if let Err(ref e) = outcome.result {
            warn!(request_id, stage = %Stage::Failed, "Classification failed: {}", e);
        }
        outcome
    }

    async fn run_stages(&self, request_id: &str, path: PathBuf) -> Result<PredictionResult> {
        let preprocessor = self.preprocessor;
        let tensor = tokio::task::spawn_blocking(move || preprocessor.decode_file(&path))
            .await
            .map_err(|e| task_failure("preprocessing", e))??;
        debug!(request_id, stage = %Stage::Preprocessed);

        let probabilities = self.engine.predict(tensor).await?;
        debug!(request_id, stage = %Stage::Inferred, ?probabilities);

        let prediction = self.resolver.resolve(&probabilities)?;
        debug!(request_id, stage = %Stage::Resolved, category = %prediction.category);

        Ok(prediction)
    }
}

/// A blocking task that panicked or was cancelled is an internal fault,
/// never the client's.
fn task_failure(task: &str, err: JoinError) -> ClassifierError {
    ClassifierError::Inference(format!("{} task failed: {}", task, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{Category, ImageTensor, INPUT_SHAPE};
    use crate::model::{Classifier, ModelLoader};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedClassifier(Vec<f32>);

    impl Classifier for FixedClassifier {
        fn input_shape(&self) -> [usize; 4] {
            INPUT_SHAPE
        }

        fn num_outputs(&self) -> usize {
            self.0.len()
        }

        fn forward(&self, _tensor: &ImageTensor) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FlakyLoader {
        path: PathBuf,
        calls: Arc<AtomicUsize>,
        fail_first: usize,
    }

    impl ModelLoader for FlakyLoader {
        fn artifact_path(&self) -> &Path {
            &self.path
        }

        fn load(&self) -> Result<Arc<dyn Classifier>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                return Err(ClassifierError::ModelLoad {
                    path: self.path.clone(),
                    reason: "file not found".to_string(),
                });
            }
            Ok(Arc::new(FixedClassifier(vec![0.05, 0.05, 0.1, 0.8])))
        }
    }

    fn pipeline(fail_first: usize) -> (TempDir, ClassificationPipeline, Arc<AtomicUsize>) {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(FlakyLoader {
            path: PathBuf::from("model/flaky.mpk"),
            calls: calls.clone(),
            fail_first,
        });
        let pipeline =
            ClassificationPipeline::new(UploadManager::new(dir.path()), ImagePreprocessor::new(), cache);
        (dir, pipeline, calls)
    }

    fn leaf_png() -> Vec<u8> {
        let img = RgbImage::from_pixel(320, 240, Rgb([40, 160, 40]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn upload_dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_classify_healthy_image() {
        let (dir, pipeline, _) = pipeline(0);

        let outcome = pipeline.classify("req-1", leaf_png()).await;
        let prediction = outcome.result.unwrap();

        assert_eq!(prediction.category, Category::Healthy);
        assert_eq!(prediction.explanation, Category::Healthy.explanation());
        assert!(outcome.cleanup.is_ok());
        assert!(upload_dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_non_image_upload_fails_and_leaves_no_file() {
        let (dir, pipeline, calls) = pipeline(0);

        let outcome = pipeline.classify("req-2", b"%PDF-1.4 not an image".to_vec()).await;

        assert!(matches!(outcome.result, Err(ClassifierError::Decode(_))));
        assert!(upload_dir_is_empty(&dir));
        // Decoding fails before the model is needed.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_load_failure_is_retried_by_next_request() {
        let (dir, pipeline, calls) = pipeline(1);

        let first = pipeline.classify("req-3", leaf_png()).await;
        assert!(matches!(first.result, Err(ClassifierError::ModelLoad { .. })));
        assert!(!pipeline.model_cache().is_loaded());
        assert!(upload_dir_is_empty(&dir));

        let second = pipeline.classify("req-4", leaf_png()).await;
        assert_eq!(second.result.unwrap().category, Category::Healthy);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(upload_dir_is_empty(&dir));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Received.to_string(), "received");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn test_panicked_preprocessing_is_not_a_decode_error() {
        let join_error = tokio::task::spawn_blocking(|| {
            panic!("decoder blew up");
        })
        .await
        .unwrap_err();

        let err = task_failure("preprocessing", join_error);
        assert!(matches!(err, ClassifierError::Inference(_)));
        assert!(err.to_string().contains("preprocessing task failed"));
    }
}
