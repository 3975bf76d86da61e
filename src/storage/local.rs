//! Local filesystem blob store (`file://` URLs)

use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::blob::BlobStore;
use crate::error::{Result, WardenError};

/// Blob store backed by local (or network-mounted) paths
#[derive(Debug, Clone, Default)]
pub struct LocalStore;

impl LocalStore {
    fn path_of(url: &str) -> Result<PathBuf> {
        let parsed = Url::parse(url).map_err(|e| WardenError::InvalidUrl {
            url: url.into(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "file" {
            return Err(WardenError::InvalidUrl {
                url: url.into(),
                reason: "scheme must be 'file'".into(),
            });
        }
        parsed.to_file_path().map_err(|_| WardenError::InvalidUrl {
            url: url.into(),
            reason: "not an absolute local path".into(),
        })
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let src = Self::path_of(url)?;
        match tokio::fs::copy(&src, dest).await {
            Ok(bytes) => {
                debug!("Copied {} ({} bytes) to {}", src.display(), bytes, dest.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WardenError::ObjectNotFound { url: url.into() })
            }
            Err(e) => Err(WardenError::StorageError {
                message: format!("Copy from {} failed: {}", src.display(), e),
            }),
        }
    }

    async fn store(&self, url: &str, src: &Path) -> Result<()> {
        let dest = Self::path_of(url)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WardenError::StorageError {
                    message: format!("Failed to create {}: {}", parent.display(), e),
                })?;
        }
        tokio::fs::copy(src, &dest)
            .await
            .map_err(|e| WardenError::StorageError {
                message: format!("Copy to {} failed: {}", dest.display(), e),
            })?;
        debug!("Stored {} at {}", src.display(), dest.display());
        Ok(())
    }
}
