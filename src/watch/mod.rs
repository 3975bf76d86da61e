//! Shutdown trigger detectors
//!
//! Each watcher runs as its own task, observes one condition, emits one
//! event and returns.

pub mod idle;
pub mod preemption;
pub mod process_exit;
pub mod signal;
pub mod uptime;

pub use idle::IdleWatcher;
pub use preemption::{PreemptionWatcher, TerminationNotice};
pub use process_exit::ProcessExitWatcher;
pub use signal::{listen_for, wait_for_shutdown_signal};
pub use uptime::UptimeWatcher;

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::WardenConfig;
use crate::event::EventEmitter;
use crate::persistence::WorkingDirectory;
use crate::server::{KillRequests, ServerProcess};

/// Handles to the running watcher tasks
#[derive(Debug, Default)]
pub struct Watchers {
    tasks: Vec<(&'static str, JoinHandle<bool>)>,
}

impl Watchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn one watcher task
    pub fn spawn<F>(&mut self, name: &'static str, watcher: F)
    where
        F: Future<Output = bool> + Send + 'static,
    {
        debug!(watcher = name, "watcher started");
        self.tasks.push((name, tokio::spawn(watcher)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every watcher that is still running
    pub fn abort_all(&self) {
        for (name, task) in &self.tasks {
            if !task.is_finished() {
                debug!(watcher = name, "aborting watcher");
                task.abort();
            }
        }
    }
}

/// Start the idle, uptime, preemption and process-exit watchers plus the
/// signal listener, each with its own emitter
pub fn spawn_all<S>(
    config: &WardenConfig,
    workdir: &WorkingDirectory,
    notice: Arc<dyn TerminationNotice>,
    process: Box<dyn ServerProcess>,
    kills: KillRequests,
    signal: S,
    emitter: &EventEmitter,
) -> Watchers
where
    S: Future<Output = std::io::Result<&'static str>> + Send + 'static,
{
    let mut watchers = Watchers::new();
    watchers.spawn(
        "idle",
        IdleWatcher::new(config, workdir.path()).run(emitter.clone()),
    );
    watchers.spawn(
        "uptime",
        UptimeWatcher::new(config.max_uptime).run(emitter.clone()),
    );
    watchers.spawn(
        "preemption",
        PreemptionWatcher::new(notice, config.preemption_poll_interval).run(emitter.clone()),
    );
    watchers.spawn(
        "process_exit",
        ProcessExitWatcher::new(process, kills).run(emitter.clone()),
    );
    watchers.spawn("signal", listen_for(signal, emitter.clone()));
    watchers
}
