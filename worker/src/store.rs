// ==============================================================================
// store.rs - Blob Store Collaborator
// ==============================================================================
// Description: Blob store interface for input and result artifacts
// Author: CBD Service Team
// Created: 2026-07-16
// Modified: 2026-08-21
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Metadata for one stored blob.
#[derive(Debug, Clone)]
pub struct BlobMetadata {
    pub id: String,
    pub file_name: String,
    pub size: u64,
}

/// External blob store the pipeline reads inputs from and publishes
/// results to.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_metadata(&self, id: &str) -> Result<BlobMetadata>;
    async fn download_to_path(&self, id: &str, path: &Path) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn create_from_path(&self, path: &Path) -> Result<String>;
}

/// Filesystem-backed blob store.
///
/// Blob ids are file names relative to the store root. Used for local
/// builds and tests; a remote store implements the same trait.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &str) -> Result<PathBuf> {
        // Ids are plain file names; reject anything that could escape the root
        if id.is_empty() || id.contains('/') || id.contains("..") {
            anyhow::bail!("invalid blob id '{}'", id);
        }
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get_metadata(&self, id: &str) -> Result<BlobMetadata> {
        let path = self.blob_path(id)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("blob '{}' not found", id))?;
        Ok(BlobMetadata {
            id: id.to_string(),
            file_name: id.to_string(),
            size: meta.len(),
        })
    }

    async fn download_to_path(&self, id: &str, path: &Path) -> Result<()> {
        let source = self.blob_path(id)?;
        tokio::fs::copy(&source, path)
            .await
            .with_context(|| format!("failed to download blob '{}'", id))?;
        debug!("downloaded blob '{}' to {}", id, path.display());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.blob_path(id)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("failed to delete blob '{}'", id))?;
        debug!("deleted blob '{}'", id);
        Ok(())
    }

    async fn create_from_path(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("blob source path has no file name")?;
        let id = format!("{}-{}", Uuid::new_v4(), file_name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .context("failed to create blob store root")?;
        tokio::fs::copy(path, self.root.join(&id))
            .await
            .with_context(|| format!("failed to store '{}'", path.display()))?;
        debug!("stored '{}' as blob '{}'", path.display(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_get_metadata() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("matrix.csv");
        tokio::fs::write(&source, "ID,a,b\n").await.unwrap();

        let store = LocalBlobStore::new(dir.path().join("store"));
        let id = store.create_from_path(&source).await.unwrap();

        let meta = store.get_metadata(&id).await.unwrap();
        assert_eq!(meta.size, 7);
        assert!(meta.file_name.ends_with("matrix.csv"));
    }

    #[tokio::test]
    async fn test_download_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.fasta");
        tokio::fs::write(&source, ">a\nACGT\n").await.unwrap();

        let store = LocalBlobStore::new(dir.path().join("store"));
        let id = store.create_from_path(&source).await.unwrap();

        let dest = dir.path().join("downloaded.fasta");
        store.download_to_path(&id, &dest).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&dest).await.unwrap(),
            ">a\nACGT\n"
        );
    }

    #[tokio::test]
    async fn test_delete_removes_blob() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.fasta");
        tokio::fs::write(&source, ">a\nACGT\n").await.unwrap();

        let store = LocalBlobStore::new(dir.path().join("store"));
        let id = store.create_from_path(&source).await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(store.get_metadata(&id).await.is_err());
        // Deleting twice fails; callers log and move on during cleanup
        assert!(store.delete(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal_ids() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.get_metadata("../etc/passwd").await.is_err());
        assert!(store.get_metadata("a/b").await.is_err());
    }
}
