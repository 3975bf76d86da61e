//! Blob store abstraction
//!
//! One object per call, addressed by URL. The scheme selects the backend.

use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;

use crate::error::{Result, WardenError};

/// Fetch/store single objects addressed by URL
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download the object at `url` into `dest`, replacing it
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;

    /// Upload `src` to `url`
    async fn store(&self, url: &str, src: &Path) -> Result<()>;
}

/// A parsed `s3://bucket/key` location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    /// Parse an `s3://` URL; the key is the path without its leading `/`
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| WardenError::InvalidUrl {
            url: url.into(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "s3" {
            return Err(WardenError::InvalidUrl {
                url: url.into(),
                reason: "scheme must be 's3'".into(),
            });
        }
        let bucket = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| WardenError::InvalidUrl {
                url: url.into(),
                reason: "missing bucket".into(),
            })?
            .to_string();
        let key = percent_decode(parsed.path().trim_start_matches('/'));
        if key.is_empty() {
            return Err(WardenError::InvalidUrl {
                url: url.into(),
                reason: "missing object key".into(),
            });
        }
        Ok(Self { bucket, key })
    }
}

/// Undo URL percent-encoding; malformed escapes are kept literally
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Scheme of a blob URL, lower-cased
pub fn scheme_of(url: &str) -> Result<String> {
    Url::parse(url)
        .map(|u| u.scheme().to_ascii_lowercase())
        .map_err(|e| WardenError::InvalidUrl {
            url: url.into(),
            reason: e.to_string(),
        })
}
