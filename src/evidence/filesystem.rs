//! Filesystem-based evidence storage.
//!
//! Stores blobs as files in a directory structure:
//! ```text
//! {base_path}/
//!   {hash[0:2]}/
//!     {hash}.{ext}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{compute_hash, hash_to_hex};
use crate::interfaces::evidence_store::{EvidenceError, EvidenceStore, Result};
use crate::model::EvidenceRef;

/// Content-addressed evidence store under a base directory.
///
/// Identical photos share one file and one reference.
pub struct FilesystemEvidenceStore {
    base_path: PathBuf,
}

impl FilesystemEvidenceStore {
    /// Create the store, creating the base directory if needed.
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn path_for(&self, hex: &str, extension: &str) -> PathBuf {
        let subdir = &hex[0..2];
        let extension = if extension.is_empty() { "bin" } else { extension };
        self.base_path
            .join(subdir)
            .join(format!("{}.{}", hex, extension))
    }

    fn path_from_ref(&self, reference: &EvidenceRef) -> Result<PathBuf> {
        reference
            .as_str()
            .strip_prefix("file://")
            .map(PathBuf::from)
            .ok_or_else(|| {
                EvidenceError::InvalidReference(format!("Not a file URI: {}", reference))
            })
    }
}

#[async_trait]
impl EvidenceStore for FilesystemEvidenceStore {
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<EvidenceRef> {
        let hex = hash_to_hex(&compute_hash(bytes));
        let path = self.path_for(&hex, extension);

        if path.exists() {
            debug!(hash = %hex, "Evidence already stored");
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("tmp");
            fs::write(&temp_path, bytes).await?;
            fs::rename(&temp_path, &path).await?;

            debug!(hash = %hex, size = bytes.len(), "Stored evidence");
        }

        Ok(EvidenceRef::new(format!("file://{}", path.display())))
    }

    async fn get(&self, reference: &EvidenceRef) -> Result<Vec<u8>> {
        let path = self.path_from_ref(reference)?;
        if !path.exists() {
            return Err(EvidenceError::NotFound(reference.to_string()));
        }

        let expected = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| EvidenceError::InvalidReference(reference.to_string()))?;

        let bytes = fs::read(&path).await?;

        let actual = hash_to_hex(&compute_hash(&bytes));
        if actual != expected {
            return Err(EvidenceError::IntegrityFailed { expected, actual });
        }

        Ok(bytes)
    }
}
