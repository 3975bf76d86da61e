//! Scheme-based dispatch between blob store backends

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::blob::{scheme_of, BlobStore};
use crate::error::{Result, WardenError};

/// Routes each URL to the backend registered for its scheme
#[derive(Default, Clone)]
pub struct BlobRouter {
    backends: HashMap<String, Arc<dyn BlobStore>>,
}

impl BlobRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` for URLs with `scheme`
    pub fn with_backend(mut self, scheme: &str, store: Arc<dyn BlobStore>) -> Self {
        self.backends.insert(scheme.to_ascii_lowercase(), store);
        self
    }

    fn backend(&self, url: &str) -> Result<&Arc<dyn BlobStore>> {
        let scheme = scheme_of(url)?;
        self.backends
            .get(&scheme)
            .ok_or_else(|| WardenError::InvalidUrl {
                url: url.into(),
                reason: format!("no blob store registered for scheme '{}'", scheme),
            })
    }
}

#[async_trait]
impl BlobStore for BlobRouter {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.backend(url)?.fetch(url, dest).await
    }

    async fn store(&self, url: &str, src: &Path) -> Result<()> {
        self.backend(url)?.store(url, src).await
    }
}
