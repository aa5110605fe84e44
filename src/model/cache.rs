//! Process-wide model cache
//!
//! Holds at most one classifier for the lifetime of its owner. The first
//! caller of `ensure_loaded` starts a load; callers arriving while it runs
//! join that same attempt and receive its outcome, success or failure. A
//! failed attempt leaves the cache empty so the next request retries.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{error, info};

use crate::model::{Classifier, ModelLoader};
use crate::utils::{ClassifierError, Result};

type LoadOutcome = std::result::Result<Arc<dyn Classifier>, Arc<ClassifierError>>;

/// A load attempt every concurrent caller can await
type InFlightLoad = Shared<BoxFuture<'static, LoadOutcome>>;

pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    model: OnceLock<Arc<dyn Classifier>>,
    /// Attempt number and future of the load currently running
    in_flight: Mutex<Option<(usize, InFlightLoad)>>,
    load_attempts: AtomicUsize,
}

impl ModelCache {
    /// Create an empty cache; nothing is read until the first `ensure_loaded`.
    pub fn new(loader: impl ModelLoader) -> Self {
        Self {
            loader: Arc::new(loader),
            model: OnceLock::new(),
            in_flight: Mutex::new(None),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Return the shared classifier, loading it on first use.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn Classifier>> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let (attempt, load) = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(model) = self.model.get() {
                return Ok(Arc::clone(model));
            }
            // A finished failure whose callers all went away is stale.
            let joinable = slot
                .as_ref()
                .filter(|(_, load)| !matches!(load.peek(), Some(Err(_))))
                .cloned();
            match joinable {
                Some(current) => current,
                None => {
                    let started = self.start_load();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        let outcome = load.await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(ref model) = outcome {
            // Every caller of one attempt holds the same instance.
            let _ = self.model.set(Arc::clone(model));
        }
        if matches!(slot.as_ref(), Some((current, _)) if *current == attempt) {
            *slot = None;
        }
        drop(slot);

        outcome.map_err(|e| self.unshare_error(e))
    }

    fn start_load(&self) -> (usize, InFlightLoad) {
        let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Loading model from {:?} (attempt {})",
            self.loader.artifact_path(),
            attempt
        );

        let loader = Arc::clone(&self.loader);
        let path = loader.artifact_path().to_path_buf();
        let load = async move {
            let result = tokio::task::spawn_blocking(move || loader.load())
                .await
                .map_err(|e| ClassifierError::ModelLoad {
                    path,
                    reason: format!("loader task failed: {}", e),
                })
                .and_then(|loaded| loaded);

            if let Err(ref e) = result {
                error!("Model load failed, will retry on next request: {}", e);
            }
            result.map_err(Arc::new)
        }
        .boxed()
        .shared();

        (attempt, load)
    }

    /// Give each caller its own copy of the shared failure
    fn unshare_error(&self, error: Arc<ClassifierError>) -> ClassifierError {
        match Arc::try_unwrap(error) {
            Ok(error) => error,
            Err(shared) => match shared.as_ref() {
                ClassifierError::ModelLoad { path, reason } => ClassifierError::ModelLoad {
                    path: path.clone(),
                    reason: reason.clone(),
                },
                other => ClassifierError::ModelLoad {
                    path: self.loader.artifact_path().to_path_buf(),
                    reason: other.to_string(),
                },
            },
        }
    }

    /// Whether a classifier has been loaded
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// The loaded classifier, without triggering a load
    pub fn get(&self) -> Option<Arc<dyn Classifier>> {
        self.model.get().cloned()
    }

    /// Number of times the loader has been invoked
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub fn artifact_path(&self) -> &Path {
        self.loader.artifact_path()
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("artifact_path", &self.loader.artifact_path())
            .field("loaded", &self.is_loaded())
            .field("load_attempts", &self.load_attempts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ImageTensor;
    use futures::future::join_all;
    use std::path::PathBuf;
    use std::time::Duration;

    struct FixedClassifier;

    impl Classifier for FixedClassifier {
        fn input_shape(&self) -> [usize; 4] {
            [1, 224, 224, 3]
        }

        fn num_outputs(&self) -> usize {
            4
        }

        fn forward(&self, _tensor: &ImageTensor) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3, 0.4])
        }
    }

    /// Counts loads and fails the first `failures` of them
    struct CountingLoader {
        path: PathBuf,
        calls: Arc<AtomicUsize>,
        failures: usize,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(calls: Arc<AtomicUsize>) -> Self {
            Self {
                path: PathBuf::from("model/test.mpk"),
                calls,
                failures: 0,
                delay: Duration::from_millis(50),
            }
        }

        fn failing_first(mut self, failures: usize) -> Self {
            self.failures = failures;
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl ModelLoader for CountingLoader {
        fn artifact_path(&self) -> &Path {
            &self.path
        }

        fn load(&self) -> Result<Arc<dyn Classifier>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if call < self.failures {
                return Err(ClassifierError::ModelLoad {
                    path: self.path.clone(),
                    reason: "corrupt".to_string(),
                });
            }
            Ok(Arc::new(FixedClassifier))
        }
    }

    #[tokio::test]
    async fn test_nothing_loaded_before_first_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(CountingLoader::new(calls.clone()));

        assert!(!cache.is_loaded());
        assert!(cache.get().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_reuse_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(CountingLoader::new(calls.clone()));

        let first = cache.ensure_loaded().await.unwrap();
        let second = cache.ensure_loaded().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_loaded());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_single_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ModelCache::new(CountingLoader::new(calls.clone())));

        let handles = (0..16).map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.ensure_loaded().await })
        });
        let models: Vec<Arc<dyn Classifier>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().ok().unwrap())
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.load_attempts(), 1);
        for model in &models {
            assert!(Arc::ptr_eq(model, &models[0]));
        }
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(CountingLoader::new(calls.clone()).failing_first(1));

        let err = cache.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
        assert!(!cache.is_loaded());

        let model = cache.ensure_loaded().await.ok().unwrap();
        assert_eq!(model.num_outputs(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_loaded());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_failed_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ModelCache::new(
            CountingLoader::new(calls.clone())
                .failing_first(usize::MAX)
                .with_delay(Duration::from_millis(200)),
        ));

        let handles = (0..8).map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.ensure_loaded().await })
        });
        let outcomes = join_all(handles).await;

        for outcome in outcomes {
            let err = outcome.unwrap().err().unwrap();
            assert!(matches!(err, ClassifierError::ModelLoad { .. }));
            assert!(err.to_string().contains("corrupt"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.load_attempts(), 1);
        assert!(!cache.is_loaded());

        // A request arriving after the failure starts a fresh attempt.
        assert!(cache.ensure_loaded().await.is_err());
        assert_eq!(cache.load_attempts(), 2);
    }
}
