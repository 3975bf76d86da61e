//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};

use spotwarden::cloud::ClusterControl;
use spotwarden::coordinator::{Collaborators, Coordinator};
use spotwarden::event::{self, EventEmitter, ExitInfo};
use spotwarden::persistence::{RestoreOrigin, SnapshotInfo, Snapshotter, WorkingDirectory};
use spotwarden::retire::NodeRetirer;
use spotwarden::server::{kill_channel, ServerProcess};
use spotwarden::storage::BlobStore;
use spotwarden::watch::{ProcessExitWatcher, TerminationNotice};
use spotwarden::{Result, WardenConfig, WardenError};

/// Ordered record of collaborator calls
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn push(&self, call: &'static str) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().iter().filter(|c| **c == call).count()
    }
}

/// In-memory blob store keyed by URL
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn with_object(self, url: &str, data: impl Into<Vec<u8>>) -> Self {
        self.objects.lock().insert(url.to_string(), data.into());
        self
    }

    pub fn object(&self, url: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(url).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let data = self
            .object(url)
            .ok_or_else(|| WardenError::ObjectNotFound { url: url.into() })?;
        tokio::fs::write(dest, data)
            .await
            .map_err(|e| WardenError::StorageError {
                message: e.to_string(),
            })
    }

    async fn store(&self, url: &str, src: &Path) -> Result<()> {
        let data = tokio::fs::read(src)
            .await
            .map_err(|e| WardenError::StorageError {
                message: e.to_string(),
            })?;
        self.objects.lock().insert(url.to_string(), data);
        Ok(())
    }
}

/// Cluster control that fails the first `failures` calls
pub struct FakeCluster {
    failures: u32,
    latency: Duration,
    calls: AtomicU32,
    log: CallLog,
}

impl FakeCluster {
    pub fn healthy(log: CallLog) -> Self {
        Self::failing(0, log)
    }

    pub fn failing(failures: u32, log: CallLog) -> Self {
        Self {
            failures,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
            log,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterControl for FakeCluster {
    async fn set_desired_capacity(&self, group: &str, capacity: u32) -> Result<()> {
        assert_eq!(capacity, 0);
        self.log.push("drain");
        sleep(self.latency).await;
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(WardenError::ClusterControl {
                group: group.into(),
                message: "throttled".into(),
            })
        } else {
            Ok(())
        }
    }
}

/// Snapshotter that records calls and optionally fails
pub struct FakeSnapshotter {
    fail: bool,
    log: CallLog,
}

impl FakeSnapshotter {
    pub fn new(fail: bool, log: CallLog) -> Self {
        Self { fail, log }
    }
}

#[async_trait]
impl Snapshotter for FakeSnapshotter {
    async fn snapshot(&self, dir: &WorkingDirectory) -> Result<SnapshotInfo> {
        self.log.push("snapshot");
        if self.fail {
            return Err(WardenError::SnapshotFailed {
                url: "mem://data".into(),
                reason: format!("store rejected {}", dir.path().display()),
            });
        }
        Ok(SnapshotInfo {
            bytes: 42,
            crc32c: 7,
            elapsed: Duration::from_millis(1),
        })
    }
}

/// Retirer that only records the call
pub struct FakeRetirer {
    log: CallLog,
}

impl FakeRetirer {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl NodeRetirer for FakeRetirer {
    async fn kill_instance(&self) -> Result<()> {
        self.log.push("retire");
        Ok(())
    }
}

/// Scripted game server.
///
/// Exits on its own after `exit_after` (if set), or `kill_delay` after the
/// first kill.
pub struct FakeServer {
    deadline: Option<Instant>,
    exit: ExitInfo,
    kill_delay: Duration,
    kills: Arc<AtomicU32>,
}

impl FakeServer {
    pub fn new(exit_after: Option<Duration>, kill_delay: Duration) -> Self {
        Self {
            deadline: exit_after.map(|d| Instant::now() + d),
            exit: ExitInfo::code(0),
            kill_delay,
            kills: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn kill_counter(&self) -> Arc<AtomicU32> {
        self.kills.clone()
    }
}

#[async_trait]
impl ServerProcess for FakeServer {
    async fn wait(&mut self) -> Result<ExitInfo> {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
        Ok(self.exit)
    }

    fn start_kill(&mut self) -> Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        let killed_at = Instant::now() + self.kill_delay;
        if self.deadline.map_or(true, |d| killed_at < d) {
            self.deadline = Some(killed_at);
            self.exit = ExitInfo::signaled(9);
        }
        Ok(())
    }

    fn id(&self) -> Option<u32> {
        Some(4242)
    }
}

/// Termination notice source that replays a script, then repeats `Ok(false)`
pub struct ScriptedNotice {
    script: Mutex<VecDeque<Result<bool>>>,
    polls: AtomicU32,
}

impl ScriptedNotice {
    pub fn new(script: Vec<Result<bool>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            polls: AtomicU32::new(0),
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TerminationNotice for ScriptedNotice {
    async fn termination_scheduled(&self) -> Result<bool> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or(Ok(false))
    }
}

/// Coordinator wired to fakes, with the real process-exit watcher owning a
/// [`FakeServer`]
pub struct Harness {
    pub coordinator: Coordinator,
    pub emitter: EventEmitter,
    pub cluster: Arc<FakeCluster>,
    pub kills: Arc<AtomicU32>,
    pub log: CallLog,
    _dir: tempfile::TempDir,
}

pub struct HarnessBuilder {
    pub config: WardenConfig,
    pub server: FakeServer,
    pub cluster_failures: u32,
    pub cluster_latency: Duration,
    pub snapshot_fails: bool,
}

impl HarnessBuilder {
    pub fn new(server: FakeServer) -> Self {
        Self {
            config: WardenConfig {
                max_uptime: Duration::from_secs(3600),
                max_idle: Duration::from_secs(3600),
                drain_retry_delay: Duration::from_millis(1),
                ..Default::default()
            },
            server,
            cluster_failures: 0,
            cluster_latency: Duration::ZERO,
            snapshot_fails: false,
        }
    }

    pub fn group(mut self, group: &str) -> Self {
        self.config.cluster_group = Some(group.into());
        self
    }

    pub fn build(self) -> Harness {
        let log = CallLog::default();
        let dir = tempfile::tempdir().unwrap();
        let workdir = WorkingDirectory::new(dir.path().to_path_buf(), RestoreOrigin::Seed);

        let cluster = Arc::new(
            FakeCluster::failing(self.cluster_failures, log.clone())
                .with_latency(self.cluster_latency),
        );
        let kills = self.server.kill_counter();

        let (emitter, events) = event::channel();
        let (kill_switch, kill_requests) = kill_channel();
        tokio::spawn(
            ProcessExitWatcher::new(Box::new(self.server), kill_requests).run(emitter.clone()),
        );

        let parts = Collaborators {
            snapshotter: Arc::new(FakeSnapshotter::new(self.snapshot_fails, log.clone())),
            cluster: cluster.clone(),
            retirer: Arc::new(FakeRetirer::new(log.clone())),
            kill_switch,
        };
        let coordinator = Coordinator::new(Arc::new(self.config), events, workdir, parts);

        Harness {
            coordinator,
            emitter,
            cluster,
            kills,
            log,
            _dir: dir,
        }
    }
}
