//! Lifecycle events
//!
//! Every watcher reports through exactly one [`Event`]. Events are plain
//! values, delivered FIFO over a single mpsc queue owned by the coordinator.

use std::fmt;
use std::process::ExitStatus;
use tokio::sync::mpsc;
use tracing::debug;

/// Capacity of the coordinator's event queue.
///
/// Each producer sends at most once, so this only needs to exceed the number
/// of producers.
pub const EVENT_QUEUE_CAPACITY: usize = 16;

/// How the game server process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (unix only)
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// Exit with the given code
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Terminated by a signal
    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Whether the process exited cleanly
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "signal {sig}"),
            (None, None) => write!(f, "unknown exit"),
        }
    }
}

/// A shutdown-relevant observation from one watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// No player activity for the configured idle window
    IdleTimeoutReached,
    /// The node has been up for the configured maximum
    UptimeExceeded,
    /// The cloud provider scheduled this instance for reclamation
    PreemptionNoticed,
    /// An operator asked the agent to stop
    ExternalTerminationRequested,
    /// The game server process is gone
    ChildProcessExited(ExitInfo),
}

impl Event {
    /// Short stable label for logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            Event::IdleTimeoutReached => "idle_timeout",
            Event::UptimeExceeded => "uptime_exceeded",
            Event::PreemptionNoticed => "preemption_noticed",
            Event::ExternalTerminationRequested => "external_termination",
            Event::ChildProcessExited(_) => "child_exited",
        }
    }

    /// Name of the producer that emits this event
    pub fn source(&self) -> &'static str {
        match self {
            Event::IdleTimeoutReached => "idle",
            Event::UptimeExceeded => "uptime",
            Event::PreemptionNoticed => "preemption",
            Event::ExternalTerminationRequested => "signal",
            Event::ChildProcessExited(_) => "process_exit",
        }
    }

    /// Whether this event asks for the cluster to be drained first
    pub fn drains_cluster(&self) -> bool {
        matches!(self, Event::IdleTimeoutReached | Event::UptimeExceeded)
    }
}

/// Send-only handle to the coordinator's event queue.
///
/// [`EventEmitter::emit`] consumes the handle, so a producer holding one
/// emitter can report at most one event.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<Event>,
}

impl EventEmitter {
    /// Wrap the sending half of the event queue
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Deliver `event` to the coordinator.
    ///
    /// Returns `false` if the coordinator is no longer listening, which is
    /// expected once it has finalized.
    pub async fn emit(self, event: Event) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(_) => {
                debug!(event = event.as_label(), "coordinator gone, event dropped");
                false
            }
        }
    }
}

/// Create the event queue: one emitter to clone into producers, one receiver
/// for the coordinator.
pub fn channel() -> (EventEmitter, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    (EventEmitter::new(tx), rx)
}
