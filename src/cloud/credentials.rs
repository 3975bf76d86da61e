//! AWS credential resolution
//!
//! Environment variables first, then the instance profile exposed by the
//! metadata service. Profile credentials are cached until shortly before
//! they expire.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

use super::metadata::{MetadataClient, SECURITY_CREDENTIALS_PATH};
use crate::error::{Result, WardenError};

/// A set of AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

/// Source of credentials for signed requests
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self) -> Result<Credentials>;
}

#[async_trait]
impl CredentialSource for Credentials {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

/// Environment, then instance profile
pub struct DefaultCredentialChain {
    metadata: MetadataClient,
    cached: Mutex<Option<(Credentials, Option<DateTime<Utc>>)>>,
}

impl DefaultCredentialChain {
    pub fn new(metadata: MetadataClient) -> Self {
        Self {
            metadata,
            cached: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<Credentials> {
        let guard = self.cached.lock();
        let (creds, expires) = guard.as_ref()?;
        match expires {
            Some(at) if *at - ChronoDuration::minutes(5) <= Utc::now() => None,
            _ => Some(creds.clone()),
        }
    }

    async fn from_instance_profile(&self) -> Result<(Credentials, Option<DateTime<Utc>>)> {
        let listing = self.metadata.get_text(SECURITY_CREDENTIALS_PATH).await?;
        let role = listing
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| WardenError::CredentialsUnavailable {
                reason: "no instance profile role attached".into(),
            })?;

        let body = self
            .metadata
            .get_text(&format!("{SECURITY_CREDENTIALS_PATH}{role}"))
            .await?;
        let parsed: RoleCredentials =
            serde_json::from_str(&body).map_err(|e| WardenError::CredentialsUnavailable {
                reason: format!("malformed role credentials: {}", e),
            })?;

        debug!(role, expiration = ?parsed.expiration, "loaded instance profile credentials");
        Ok((
            Credentials {
                access_key_id: parsed.access_key_id,
                secret_access_key: parsed.secret_access_key,
                session_token: parsed.token,
            },
            parsed.expiration,
        ))
    }
}

#[async_trait]
impl CredentialSource for DefaultCredentialChain {
    async fn credentials(&self) -> Result<Credentials> {
        if let Some(creds) = Credentials::from_env() {
            return Ok(creds);
        }
        if let Some(creds) = self.cached() {
            return Ok(creds);
        }

        let (creds, expires) = self.from_instance_profile().await.map_err(|e| {
            WardenError::CredentialsUnavailable {
                reason: format!("environment unset and instance profile failed: {}", e),
            }
        })?;
        *self.cached.lock() = Some((creds.clone(), expires));
        Ok(creds)
    }
}
