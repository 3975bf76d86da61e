//! Instance metadata service client
//!
//! Talks to the link-local metadata endpoint using IMDSv2 session tokens when
//! available and plain requests otherwise.

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, WardenError};

/// Well-known metadata endpoint
pub const METADATA_ENDPOINT: &str = "http://169.254.169.254";

/// Answers 200 only when a spot interruption is scheduled, 404 otherwise
pub const TERMINATION_TIME_PATH: &str = "/latest/meta-data/spot/termination-time";

/// Self-identification
pub const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";

/// Instance profile credentials listing
pub const SECURITY_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

const TOKEN_PATH: &str = "/latest/api/token";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";

/// Client for the instance metadata service
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
    base_url: String,
}

impl MetadataClient {
    /// Client for the real metadata endpoint
    pub fn new() -> Result<Self> {
        Self::with_base_url(METADATA_ENDPOINT)
    }

    /// Client for an arbitrary endpoint (local testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .connect_timeout(Duration::from_secs(1))
            .build()
            .map_err(|e| WardenError::Metadata {
                path: "/".into(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch an IMDSv2 session token; `None` means fall back to IMDSv1
    async fn session_token(&self) -> Option<String> {
        let resp = self
            .client
            .put(self.url(TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, "21600")
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), "metadata token unavailable, using IMDSv1");
            return None;
        }
        resp.text().await.ok()
    }

    /// Issue a GET and hand back the raw status and body
    pub async fn get(&self, path: &str) -> Result<(StatusCode, String)> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = self.session_token().await {
            req = req.header(TOKEN_HEADER, token);
        }

        let resp = req.send().await.map_err(|e| WardenError::Metadata {
            path: path.into(),
            reason: e.to_string(),
        })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| WardenError::Metadata {
            path: path.into(),
            reason: format!("failed to read body: {}", e),
        })?;
        Ok((status, body))
    }

    /// GET that must succeed
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let (status, body) = self.get(path).await?;
        if !status.is_success() {
            return Err(WardenError::Metadata {
                path: path.into(),
                reason: format!("status {}", status),
            });
        }
        Ok(body)
    }

    /// Whether the provider has scheduled this instance for termination.
    ///
    /// Only a 2xx answer is a notice and 404 means nothing is scheduled.
    /// Any other status (401 on a lost session token, 5xx) is an error, as
    /// are transport failures.
    pub async fn termination_scheduled(&self) -> Result<bool> {
        let (status, body) = self.get(TERMINATION_TIME_PATH).await?;
        debug!(status = %status, body = %body.trim(), "termination-time poll");
        termination_status(status)
    }

    /// This instance's id
    pub async fn instance_id(&self) -> Result<String> {
        Ok(self.get_text(INSTANCE_ID_PATH).await?.trim().to_string())
    }
}

fn termination_status(status: StatusCode) -> Result<bool> {
    match status {
        StatusCode::NOT_FOUND => Ok(false),
        s if s.is_success() => Ok(true),
        s => Err(WardenError::Metadata {
            path: TERMINATION_TIME_PATH.into(),
            reason: format!("unexpected status {}", s),
        }),
    }
}
