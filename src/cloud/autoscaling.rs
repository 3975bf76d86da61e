//! Autoscaling group capacity control

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::credentials::CredentialSource;
use super::sigv4::{self, SigningParams};
use crate::error::{Result, WardenError};

const API_VERSION: &str = "2011-01-01";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Remote control over the cluster this node belongs to
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Set the desired member count of `group`
    async fn set_desired_capacity(&self, group: &str, capacity: u32) -> Result<()>;
}

/// AutoScaling query-API client
pub struct AutoScalingClient {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
    region: String,
    endpoint: String,
}

impl AutoScalingClient {
    /// Client for the regional AutoScaling endpoint
    pub fn new(region: impl Into<String>, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let region = region.into();
        let endpoint = format!("autoscaling.{}.amazonaws.com", region);
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WardenError::Internal {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            credentials,
            region,
            endpoint,
        })
    }
}

#[async_trait]
impl ClusterControl for AutoScalingClient {
    async fn set_desired_capacity(&self, group: &str, capacity: u32) -> Result<()> {
        let capacity = capacity.to_string();
        let body = sigv4::canonical_query(&[
            ("Action", "SetDesiredCapacity"),
            ("AutoScalingGroupName", group),
            ("DesiredCapacity", &capacity),
            ("HonorCooldown", "true"),
            ("Version", API_VERSION),
        ]);

        let creds = self.credentials.credentials().await?;
        let params = SigningParams {
            credentials: &creds,
            region: &self.region,
            service: "autoscaling",
            time: Utc::now(),
        };
        let content_type = [("content-type".to_string(), FORM_CONTENT_TYPE.to_string())];
        let headers = sigv4::sign_request(
            "POST",
            &self.endpoint,
            "/",
            "",
            &content_type,
            &sigv4::sha256_hex(body.as_bytes()),
            &params,
        );

        let mut req = self
            .client
            .post(format!("https://{}/", self.endpoint))
            .body(body);
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req.send().await.map_err(|e| WardenError::ClusterControl {
            group: group.into(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(WardenError::ClusterControl {
                group: group.into(),
                message: format!("status {}: {}", status, text.trim()),
            });
        }

        debug!(group, capacity = %capacity, "SetDesiredCapacity accepted");
        Ok(())
    }
}
