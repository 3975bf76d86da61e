//! Persistence manager
//!
//! Restores the working directory from the remote snapshot (or seeds a fresh
//! one on first run) and snapshots it back at finalize time.

use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::archive::ArchiveCodec;
use crate::config::WardenConfig;
use crate::error::{Result, WardenError};
use crate::metrics::standard;
use crate::storage::BlobStore;

const DATA_DIR_PREFIX: &str = "mcdata";
const JAR_DIR_PREFIX: &str = "mcjar";
const SERVER_JAR_NAME: &str = "server.jar";

/// Locations used by the persistence manager
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Remote snapshot archive
    pub data_url: String,
    /// Remote seed file used when no snapshot exists
    pub seed_url: String,
    /// Name of the seed file inside the working directory
    pub seed_file_name: String,
    /// Remote server binary
    pub server_jar_url: String,
    /// Parent of the working directory and scratch files
    pub work_root: PathBuf,
}

impl From<&WardenConfig> for PersistenceConfig {
    fn from(config: &WardenConfig) -> Self {
        Self {
            data_url: config.data_url.clone(),
            seed_url: config.seed_url.clone(),
            seed_file_name: config.seed_file_name.clone(),
            server_jar_url: config.server_jar_url.clone(),
            work_root: config.work_root.clone(),
        }
    }
}

/// How the working directory was populated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOrigin {
    /// Unpacked from the previous snapshot
    Snapshot,
    /// No snapshot; seeded with the seed file only
    Seed,
}

/// Node-local directory holding the server's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    path: PathBuf,
    origin: RestoreOrigin,
}

impl WorkingDirectory {
    pub fn new(path: PathBuf, origin: RestoreOrigin) -> Self {
        Self { path, origin }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> RestoreOrigin {
        self.origin
    }
}

/// Result of a successful snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Archive size in bytes
    pub bytes: u64,
    /// CRC32C of the archive
    pub crc32c: u32,
    /// Time spent packing and uploading
    pub elapsed: Duration,
}

/// Finalize-time snapshot step, as seen by the coordinator
#[async_trait]
pub trait Snapshotter: Send + Sync {
    async fn snapshot(&self, dir: &WorkingDirectory) -> Result<SnapshotInfo>;
}

/// Restore/snapshot orchestration over a blob store and an archive codec
pub struct Persistence {
    store: Arc<dyn BlobStore>,
    codec: Arc<dyn ArchiveCodec>,
    config: PersistenceConfig,
}

impl Persistence {
    /// Create a new persistence manager
    pub fn new(
        store: Arc<dyn BlobStore>,
        codec: Arc<dyn ArchiveCodec>,
        config: PersistenceConfig,
    ) -> Self {
        Self {
            store,
            codec,
            config,
        }
    }

    fn scratch_file(&self, prefix: &str) -> Result<tempfile::NamedTempFile> {
        tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".tgz")
            .tempfile_in(&self.config.work_root)
            .map_err(|e| WardenError::WorkdirCreate {
                parent: self.config.work_root.clone(),
                source: e,
            })
    }

    fn fresh_dir(&self, prefix: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.config.work_root)
            .and_then(|_| {
                tempfile::Builder::new()
                    .prefix(prefix)
                    .tempdir_in(&self.config.work_root)
            })
            .map(|dir| dir.keep())
            .map_err(|e| WardenError::WorkdirCreate {
                parent: self.config.work_root.clone(),
                source: e,
            })
    }

    /// Create the working directory and populate it from the remote snapshot,
    /// falling back to the seed file when no usable snapshot can be fetched.
    pub async fn restore(&self) -> Result<WorkingDirectory> {
        let dir = self.fresh_dir(DATA_DIR_PREFIX)?;
        let scratch = self.scratch_file("restore")?;

        info!(url = %self.config.data_url, dir = %dir.display(), "restoring working directory");

        match self.store.fetch(&self.config.data_url, scratch.path()).await {
            Ok(()) => match self.unpack(scratch.path(), &dir).await {
                Ok(()) => {
                    info!(dir = %dir.display(), "working directory restored from snapshot");
                    return Ok(WorkingDirectory::new(dir, RestoreOrigin::Snapshot));
                }
                Err(e) => {
                    error!(
                        archive = %scratch.path().display(),
                        error = %e,
                        "snapshot unpack failed, treating as first run"
                    );
                    self.clear_dir(&dir)?;
                }
            },
            Err(WardenError::ObjectNotFound { .. }) => {
                info!("no prior snapshot, treating as first run")
            }
            Err(e) => warn!(error = %e, "snapshot fetch failed, treating as first run"),
        }

        let seed_path = dir.join(&self.config.seed_file_name);
        info!(url = %self.config.seed_url, "downloading seed file");
        self.store
            .fetch(&self.config.seed_url, &seed_path)
            .await
            .map_err(|e| WardenError::SeedUnavailable {
                url: self.config.seed_url.clone(),
                reason: e.to_string(),
            })?;

        info!(path = %seed_path.display(), "working directory seeded");
        Ok(WorkingDirectory::new(dir, RestoreOrigin::Seed))
    }

    /// Drop whatever a failed unpack left behind, keeping `dir` itself
    fn clear_dir(&self, dir: &Path) -> Result<()> {
        std::fs::remove_dir_all(dir)
            .and_then(|_| std::fs::create_dir(dir))
            .map_err(|e| WardenError::WorkdirCreate {
                parent: self.config.work_root.clone(),
                source: e,
            })
    }

    async fn unpack(&self, archive: &Path, dir: &Path) -> Result<()> {
        let codec = self.codec.clone();
        let archive = archive.to_path_buf();
        let target = dir.to_path_buf();
        tokio::task::spawn_blocking(move || codec.unpack(&archive, &target))
            .await
            .map_err(|e| WardenError::Internal {
                message: format!("unpack task failed: {}", e),
            })?
    }

    /// Pack `dir` and store it at the snapshot location.
    ///
    /// Failures are reported to the caller, never retried here.
    pub async fn snapshot(&self, dir: &WorkingDirectory) -> Result<SnapshotInfo> {
        let start = Instant::now();
        let result = self.snapshot_inner(dir.path(), start).await;

        standard::SNAPSHOT_DURATION.observe(start.elapsed().as_secs_f64());
        match &result {
            Ok(info) => {
                standard::SNAPSHOTS_WRITTEN.inc();
                standard::SNAPSHOT_BYTES.inc_by(info.bytes);
                info!(
                    url = %self.config.data_url,
                    bytes = info.bytes,
                    crc32c = info.crc32c,
                    elapsed_ms = info.elapsed.as_millis() as u64,
                    "snapshot stored"
                );
            }
            Err(e) => {
                standard::SNAPSHOT_FAILURES.inc();
                warn!(url = %self.config.data_url, error = %e, "snapshot failed");
            }
        }
        result
    }

    async fn snapshot_inner(&self, dir: &Path, start: Instant) -> Result<SnapshotInfo> {
        let failed = |reason: String| WardenError::SnapshotFailed {
            url: self.config.data_url.clone(),
            reason,
        };

        let scratch = self.scratch_file("snapshot").map_err(|e| failed(e.to_string()))?;
        let archive = scratch.path().to_path_buf();

        let codec = self.codec.clone();
        let source = dir.to_path_buf();
        let target = archive.clone();
        let (bytes, crc32c) = tokio::task::spawn_blocking(move || -> Result<(u64, u32)> {
            codec.pack(&source, &target)?;
            checksum_file(&target)
        })
        .await
        .map_err(|e| failed(format!("pack task failed: {}", e)))?
        .map_err(|e| failed(e.to_string()))?;

        debug!(archive = %archive.display(), bytes, "snapshot archive packed");

        self.store
            .store(&self.config.data_url, &archive)
            .await
            .map_err(|e| failed(e.to_string()))?;

        Ok(SnapshotInfo {
            bytes,
            crc32c,
            elapsed: start.elapsed(),
        })
    }

    /// Download the server binary into a fresh scratch directory
    pub async fn fetch_server_binary(&self) -> Result<PathBuf> {
        let dir = self.fresh_dir(JAR_DIR_PREFIX)?;
        let jar = dir.join(SERVER_JAR_NAME);

        info!(url = %self.config.server_jar_url, "retrieving game server binary");
        self.store.fetch(&self.config.server_jar_url, &jar).await?;
        info!(path = %jar.display(), "game server binary ready");
        Ok(jar)
    }
}

#[async_trait]
impl Snapshotter for Persistence {
    async fn snapshot(&self, dir: &WorkingDirectory) -> Result<SnapshotInfo> {
        Persistence::snapshot(self, dir).await
    }
}

/// Size and CRC32C of a file
fn checksum_file(path: &Path) -> Result<(u64, u32)> {
    let io_err = |e: std::io::Error| WardenError::Internal {
        message: format!("failed to read {}: {}", path.display(), e),
    };

    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut buffer = [0u8; 64 * 1024];
    let mut crc = 0u32;
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buffer).map_err(io_err)?;
        if n == 0 {
            break;
        }
        crc = crc32c::crc32c_append(crc, &buffer[..n]);
        total += n as u64;
    }
    Ok((total, crc))
}
