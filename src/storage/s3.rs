//! S3 object store
//!
//! Pure-Rust async client using reqwest with AWS SigV4 signing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{header::CONTENT_LENGTH, Body, Client, Method, StatusCode, Url};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::blob::{BlobStore, S3Location};
use crate::cloud::credentials::CredentialSource;
use crate::cloud::sigv4::{self, SigningParams};
use crate::config::DEFAULT_REGION;
use crate::error::{Result, WardenError};

/// Configuration for the S3 client
#[derive(Debug, Clone)]
pub struct S3Config {
    /// AWS region
    pub region: String,
    /// Path-style endpoint override (MinIO and friends)
    pub endpoint: Option<String>,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            endpoint: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
        }
    }
}

/// S3 blob store
pub struct S3Store {
    client: Client,
    config: S3Config,
    credentials: Arc<dyn CredentialSource>,
}

impl S3Store {
    /// Create a new S3 store
    pub fn new(config: S3Config, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| WardenError::StorageError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// Request URL for an object
    fn object_url(&self, loc: &S3Location) -> Result<Url> {
        let key = sigv4::uri_encode(&loc.key, true);
        let raw = match &self.config.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), loc.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                loc.bucket, self.config.region, key
            ),
        };
        Url::parse(&raw).map_err(|e| WardenError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// Build a signed request
    async fn signed(
        &self,
        method: Method,
        url: &Url,
        payload_sha256: &str,
    ) -> Result<reqwest::RequestBuilder> {
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(WardenError::InvalidUrl {
                    url: url.to_string(),
                    reason: "missing host".into(),
                })
            }
        };

        let creds = self.credentials.credentials().await?;
        let params = SigningParams {
            credentials: &creds,
            region: &self.config.region,
            service: "s3",
            time: Utc::now(),
        };
        let headers = sigv4::sign_request(
            method.as_str(),
            &host,
            url.path(),
            "",
            &[],
            payload_sha256,
            &params,
        );

        let mut req = self.client.request(method, url.clone());
        for (name, value) in headers {
            req = req.header(name, value);
        }
        Ok(req)
    }

    /// Get an object, streaming it into `dest`
    pub async fn get_object(&self, loc: &S3Location, dest: &Path) -> Result<u64> {
        let url = self.object_url(loc)?;
        let object = format!("s3://{}/{}", loc.bucket, loc.key);

        let mut resp = self
            .signed(Method::GET, &url, sigv4::EMPTY_PAYLOAD_SHA256)
            .await?
            .send()
            .await
            .map_err(|e| WardenError::StorageError {
                message: format!("Get object failed for {}: {}", object, e),
            })?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(WardenError::ObjectNotFound { url: object });
        }

        if !resp.status().is_success() {
            return Err(WardenError::StorageError {
                message: format!("Get object failed for {}: status {}", object, resp.status()),
            });
        }

        let io_err = |e: std::io::Error| WardenError::StorageError {
            message: format!("Failed to write {}: {}", dest.display(), e),
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(|e| WardenError::StorageError {
            message: format!("Failed to read body for {}: {}", object, e),
        })? {
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;

        debug!(object = %object, bytes = written, "get complete");
        Ok(written)
    }

    /// Put an in-memory object to S3
    pub async fn put_object(&self, loc: &S3Location, data: Bytes) -> Result<String> {
        let digest = sigv4::sha256_hex(&data);
        self.put(loc, &digest, data.len() as u64, Body::from(data))
            .await
    }

    /// Put a file to S3, streaming the body from disk
    pub async fn put_file(&self, loc: &S3Location, src: &Path) -> Result<String> {
        let read_err = |e: std::io::Error| WardenError::StorageError {
            message: format!("Failed to read {}: {}", src.display(), e),
        };

        let path = src.to_path_buf();
        let (len, digest) = tokio::task::spawn_blocking(move || file_sha256(&path))
            .await
            .map_err(|e| WardenError::Internal {
                message: format!("hash task failed: {}", e),
            })?
            .map_err(read_err)?;

        let file = tokio::fs::File::open(src).await.map_err(read_err)?;
        self.put(loc, &digest, len, Body::from(file)).await
    }

    async fn put(
        &self,
        loc: &S3Location,
        payload_sha256: &str,
        len: u64,
        body: Body,
    ) -> Result<String> {
        let url = self.object_url(loc)?;
        let object = format!("s3://{}/{}", loc.bucket, loc.key);

        let resp = self
            .signed(Method::PUT, &url, payload_sha256)
            .await?
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| WardenError::StorageError {
                message: format!("Put object failed for {}: {}", object, e),
            })?;

        if !resp.status().is_success() {
            return Err(WardenError::StorageError {
                message: format!("Put object failed for {}: status {}", object, resp.status()),
            });
        }

        let etag = resp
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        debug!(object = %object, bytes = len, etag = %etag, "put complete");
        Ok(etag)
    }
}

/// Length and hex SHA-256 of a file, read in fixed-size chunks
fn file_sha256(path: &Path) -> std::io::Result<(u64, String)> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }
    Ok((total, format!("{:x}", hasher.finalize())))
}

#[async_trait]
impl BlobStore for S3Store {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let loc = S3Location::parse(url)?;
        self.get_object(&loc, dest).await.map(|_| ())
    }

    async fn store(&self, url: &str, src: &Path) -> Result<()> {
        let loc = S3Location::parse(url)?;
        self.put_file(&loc, src).await.map(|_| ())
    }
}
