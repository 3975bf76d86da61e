//! Error types for spotwarden
//!
//! Error taxonomy covering storage, archive, persistence, cluster control,
//! process supervision and node retirement.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for all spotwarden operations
#[derive(Debug, Error)]
pub enum WardenError {
    // ========== Storage Errors ==========

    /// Object store operation failed
    #[error("object store operation failed: {message}")]
    StorageError { message: String },

    /// Object not found in storage
    #[error("object not found: {url}")]
    ObjectNotFound { url: String },

    /// Blob URL could not be parsed or has an unsupported scheme
    #[error("invalid blob url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No usable credentials for a signed request
    #[error("no AWS credentials available: {reason}")]
    CredentialsUnavailable { reason: String },

    // ========== Archive Errors ==========

    /// Packing a directory into an archive failed
    #[error("failed to pack {dir}: {reason}")]
    PackFailed { dir: PathBuf, reason: String },

    /// Unpacking an archive into a directory failed
    #[error("failed to unpack {archive}: {reason}")]
    UnpackFailed { archive: PathBuf, reason: String },

    // ========== Persistence Errors ==========

    /// Working directory could not be created
    #[error("failed to create working directory under {parent}: {source}")]
    WorkdirCreate {
        parent: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither a prior snapshot nor the seed file could be fetched
    #[error("no prior snapshot and seed file {url} unavailable: {reason}")]
    SeedUnavailable { url: String, reason: String },

    /// Snapshot of the working directory could not be persisted
    #[error("snapshot to {url} failed: {reason}")]
    SnapshotFailed { url: String, reason: String },

    // ========== Cluster Errors ==========

    /// Remote capacity call failed
    #[error("cluster control call for group {group} failed: {message}")]
    ClusterControl { group: String, message: String },

    // ========== Process Errors ==========

    /// Game server process could not be started
    #[error("failed to start {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or signalling the game server failed
    #[error("game server process error: {message}")]
    ProcessControl { message: String },

    // ========== Retirement Errors ==========

    /// OS shutdown command failed
    #[error("shutdown command `{command}` failed: {reason}")]
    ShutdownCommand { command: String, reason: String },

    // ========== Metadata Errors ==========

    /// Instance metadata service request failed
    #[error("metadata request {path} failed: {reason}")]
    Metadata { path: String, reason: String },

    // ========== Runtime Errors ==========

    /// Configuration missing or invalid
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Every event producer went away before the game server exited
    #[error("event stream closed before the game server exited")]
    EventStreamClosed,

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl WardenError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WardenError::StorageError { .. }
                | WardenError::ClusterControl { .. }
                | WardenError::Metadata { .. }
        )
    }

    /// Short stable label for logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            WardenError::StorageError { .. } => "storage_error",
            WardenError::ObjectNotFound { .. } => "object_not_found",
            WardenError::InvalidUrl { .. } => "invalid_url",
            WardenError::CredentialsUnavailable { .. } => "credentials_unavailable",
            WardenError::PackFailed { .. } => "pack_failed",
            WardenError::UnpackFailed { .. } => "unpack_failed",
            WardenError::WorkdirCreate { .. } => "workdir_create",
            WardenError::SeedUnavailable { .. } => "seed_unavailable",
            WardenError::SnapshotFailed { .. } => "snapshot_failed",
            WardenError::ClusterControl { .. } => "cluster_control",
            WardenError::ProcessSpawn { .. } => "process_spawn",
            WardenError::ProcessControl { .. } => "process_control",
            WardenError::ShutdownCommand { .. } => "shutdown_command",
            WardenError::Metadata { .. } => "metadata",
            WardenError::Config { .. } => "config",
            WardenError::EventStreamClosed => "event_stream_closed",
            WardenError::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for spotwarden operations
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_failures_are_retryable() {
        let err = WardenError::ClusterControl {
            group: "mc".into(),
            message: "throttled".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.as_label(), "cluster_control");
    }

    #[test]
    fn persistence_failures_are_not_retryable() {
        let err = WardenError::SeedUnavailable {
            url: "s3://b/eula.txt".into(),
            reason: "404".into(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("s3://b/eula.txt"));
    }
}
