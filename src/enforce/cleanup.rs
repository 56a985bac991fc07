//! Removal of upload artifacts staged for a request that ends up blocked.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{PiiGuardError, Result};

/// Request extension naming a file the host already stored for this request
/// (e.g. an uploaded image) that must not outlive a blocked submission.
#[derive(Debug, Clone)]
pub struct StagedUpload(pub PathBuf);

/// Storage collaborator able to delete a staged upload.
#[async_trait::async_trait]
pub trait UploadStore: Send + Sync {
    /// Delete `path`. Succeeds when the file is already gone.
    async fn remove_if_present(&self, path: &Path) -> Result<()>;
}

/// [`UploadStore`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsUploadStore;

#[async_trait::async_trait]
impl UploadStore for FsUploadStore {
    async fn remove_if_present(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PiiGuardError::Cleanup {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Remove the staged upload, if any. Failures are logged, never returned.
pub async fn discard_staged_upload(store: &dyn UploadStore, upload: Option<&StagedUpload>) {
    let Some(StagedUpload(path)) = upload else {
        return;
    };
    match store.remove_if_present(path).await {
        Ok(()) => debug!(path = %path.display(), "removed staged upload of blocked request"),
        Err(e) => error!("Error deleting uploaded file: {}", e),
    }
}
