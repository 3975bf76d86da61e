//! Coordinator state

use std::fmt;

/// Position of the coordinator in the shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    /// Serving; no shutdown trigger seen yet
    #[default]
    Running,
    /// Scaling the owning group down to zero
    ClusterDraining,
    /// Kill requested; waiting for the child to exit
    ChildTerminating,
    /// Child gone; snapshotting and retiring the node
    Finalizing,
    /// Done
    Terminated,
}

impl CoordinatorState {
    /// Value reported on the state gauge
    pub fn ordinal(&self) -> i64 {
        match self {
            CoordinatorState::Running => 0,
            CoordinatorState::ClusterDraining => 1,
            CoordinatorState::ChildTerminating => 2,
            CoordinatorState::Finalizing => 3,
            CoordinatorState::Terminated => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatorState::Running => "running",
            CoordinatorState::ClusterDraining => "cluster_draining",
            CoordinatorState::ChildTerminating => "child_terminating",
            CoordinatorState::Finalizing => "finalizing",
            CoordinatorState::Terminated => "terminated",
        }
    }

    /// Whether a shutdown trigger has already been accepted
    pub fn is_shutting_down(&self) -> bool {
        *self != CoordinatorState::Running
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
