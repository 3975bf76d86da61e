//! Coordinator control loop
//!
//! Single consumer of the event queue. Turns the first shutdown trigger into
//! drain / kill requests, and the child's exit into snapshot + retirement.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::drain::{drain_cluster, DrainOutcome, DrainPolicy};
use super::state::CoordinatorState;
use crate::cloud::ClusterControl;
use crate::config::WardenConfig;
use crate::error::{Result, WardenError};
use crate::event::{Event, ExitInfo};
use crate::metrics::standard;
use crate::persistence::{SnapshotInfo, Snapshotter, WorkingDirectory};
use crate::retire::NodeRetirer;
use crate::server::KillSwitch;

/// External collaborators the coordinator drives
#[derive(Clone)]
pub struct Collaborators {
    pub snapshotter: Arc<dyn Snapshotter>,
    pub cluster: Arc<dyn ClusterControl>,
    pub retirer: Arc<dyn NodeRetirer>,
    pub kill_switch: KillSwitch,
}

/// What happened during shutdown
#[derive(Debug)]
pub struct ShutdownReport {
    /// First shutdown trigger, `None` if the child exited on its own
    pub trigger: Option<Event>,
    pub drain: DrainOutcome,
    /// Whether a kill was sent to the child
    pub kill_requested: bool,
    pub exit: ExitInfo,
    pub snapshot: Result<SnapshotInfo>,
    pub retire: Result<()>,
}

impl ShutdownReport {
    /// Whether the working directory was persisted
    pub fn data_saved(&self) -> bool {
        self.snapshot.is_ok()
    }
}

/// Per-node lifecycle coordinator
pub struct Coordinator {
    config: Arc<WardenConfig>,
    events: mpsc::Receiver<Event>,
    workdir: WorkingDirectory,
    parts: Collaborators,
    state: CoordinatorState,
    trigger: Option<Event>,
    drain: DrainOutcome,
    kill_requested: bool,
}

/// Result of handling one event
enum Step {
    Continue,
    ChildExited(ExitInfo),
}

impl Coordinator {
    /// Create a coordinator that owns the receive side of the event queue
    pub fn new(
        config: Arc<WardenConfig>,
        events: mpsc::Receiver<Event>,
        workdir: WorkingDirectory,
        parts: Collaborators,
    ) -> Self {
        Self {
            config,
            events,
            workdir,
            parts,
            state: CoordinatorState::Running,
            trigger: None,
            drain: DrainOutcome::Skipped,
            kill_requested: false,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    fn transition(&mut self, to: CoordinatorState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "coordinator state change");
            self.state = to;
        }
        standard::COORDINATOR_STATE.set(to.ordinal());
    }

    /// Consume events until the child exits, then snapshot and retire.
    ///
    /// Fails only if the event queue closes before the child's exit is seen.
    pub async fn run(mut self) -> Result<ShutdownReport> {
        standard::COORDINATOR_STATE.set(self.state.ordinal());
        info!(dir = %self.workdir.path().display(), "coordinator running");

        while let Some(event) = self.events.recv().await {
            if let Step::ChildExited(exit) = self.handle(event).await {
                return Ok(self.finalize(exit).await);
            }
        }

        error!(state = %self.state, "event stream closed before the game server exited");
        Err(WardenError::EventStreamClosed)
    }

    async fn handle(&mut self, event: Event) -> Step {
        standard::EVENTS_RECEIVED.inc();
        info!(
            event = event.as_label(),
            watcher = event.source(),
            state = %self.state,
            "event received"
        );

        if let Event::ChildProcessExited(exit) = event {
            return Step::ChildExited(exit);
        }

        if self.state.is_shutting_down() {
            info!(event = event.as_label(), "shutdown already in progress, ignoring");
            return Step::Continue;
        }
        self.trigger = Some(event);

        if event.drains_cluster() {
            match self.config.drain_group().map(str::to_owned) {
                Some(group) => {
                    if let Step::ChildExited(exit) = self.drain(&group).await {
                        return Step::ChildExited(exit);
                    }
                }
                None => debug!("no autoscaling group configured, skipping drain"),
            }
        }

        self.terminate_child();
        Step::Continue
    }

    /// Run the drain while still watching the queue: a child exit abandons
    /// the drain, any other event is a duplicate trigger.
    async fn drain(&mut self, group: &str) -> Step {
        self.transition(CoordinatorState::ClusterDraining);

        let cluster = self.parts.cluster.clone();
        let policy = DrainPolicy::from_config(&self.config);
        let mut attempts = 0u32;
        let mut queue_open = true;

        let step = {
            let drain = drain_cluster(cluster.as_ref(), group, policy, &mut attempts);
            tokio::pin!(drain);
            loop {
                tokio::select! {
                    outcome = &mut drain => break Ok(outcome),
                    event = self.events.recv(), if queue_open => match event {
                        Some(Event::ChildProcessExited(exit)) => {
                            standard::EVENTS_RECEIVED.inc();
                            break Err(exit);
                        }
                        Some(other) => {
                            standard::EVENTS_RECEIVED.inc();
                            info!(
                                event = other.as_label(),
                                watcher = other.source(),
                                "drain in progress, ignoring"
                            );
                        }
                        None => queue_open = false,
                    },
                }
            }
        };

        match step {
            Ok(outcome) => {
                self.drain = outcome;
                Step::Continue
            }
            Err(exit) => {
                warn!(attempts, "game server exited during drain, abandoning drain");
                self.drain = DrainOutcome::Interrupted { attempts };
                Step::ChildExited(exit)
            }
        }
    }

    fn terminate_child(&mut self) {
        self.transition(CoordinatorState::ChildTerminating);
        if self.parts.kill_switch.request_kill() {
            info!("kill requested for game server");
            self.kill_requested = true;
        } else {
            warn!("kill request not delivered, game server already gone");
        }
    }

    async fn finalize(mut self, exit: ExitInfo) -> ShutdownReport {
        self.transition(CoordinatorState::Finalizing);
        info!(%exit, "game server down, saving data");

        let snapshot = self.parts.snapshotter.snapshot(&self.workdir).await;
        if let Err(e) = &snapshot {
            error!(
                error = %e,
                dir = %self.workdir.path().display(),
                "snapshot failed, changes since the last snapshot are lost"
            );
        }

        info!("retiring node");
        let retire = self.parts.retirer.kill_instance().await;
        match &retire {
            Ok(()) => info!("node retired"),
            Err(e) => error!(error = %e, "node retirement failed"),
        }

        self.transition(CoordinatorState::Terminated);
        ShutdownReport {
            trigger: self.trigger,
            drain: self.drain,
            kill_requested: self.kill_requested,
            exit,
            snapshot,
            retire,
        }
    }
}
