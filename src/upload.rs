//! Upload lifecycle
//!
//! Each request's image is written to a uniquely named file in the upload
//! directory, handed to the caller's closure by path, and removed exactly
//! once afterwards. Removal failures are reported next to the closure's
//! result and never replace it.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::utils::{ClassifierError, Result};

/// Default directory for transient uploads
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Result of a scoped upload: what the closure returned, and whether the
/// file was removed afterwards
#[derive(Debug)]
pub struct UploadOutcome<T> {
    pub result: Result<T>,
    pub cleanup: Result<()>,
}

impl<T> UploadOutcome<T> {
    /// Drop the cleanup report, keeping the closure's result
    pub fn into_result(self) -> Result<T> {
        self.result
    }
}

#[derive(Debug, Clone)]
pub struct UploadManager {
    dir: PathBuf,
}

impl UploadManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist yet
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Persist `bytes`, run `f` with the file path, then remove the file.
    ///
    /// The file is removed whether `f` succeeds or fails. If `f` panics the
    /// file is removed while the stack unwinds.
    pub async fn with_upload<T, F, Fut>(&self, bytes: Vec<u8>, f: F) -> UploadOutcome<T>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let file = match self.persist(bytes).await {
            Ok(file) => file,
            Err(e) => {
                return UploadOutcome {
                    result: Err(e),
                    cleanup: Ok(()),
                }
            }
        };

        let path = file.path().to_path_buf();
        debug!("Stored upload at {:?}", path);

        let result = f(path.clone()).await;
        let cleanup = Self::remove(file, path).await;

        UploadOutcome { result, cleanup }
    }

    async fn persist(&self, bytes: Vec<u8>) -> Result<NamedTempFile> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || -> Result<NamedTempFile> {
            // A partially written file is removed when `file` drops on error.
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| ClassifierError::Io(std::io::Error::other(e)))?
    }

    async fn remove(file: NamedTempFile, path: PathBuf) -> Result<()> {
        let removed = tokio::task::spawn_blocking(move || file.close())
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)));

        removed.map_err(|source| {
            warn!("Failed to remove upload {:?}: {}", path, source);
            ClassifierError::Cleanup { path, source }
        })
    }
}
