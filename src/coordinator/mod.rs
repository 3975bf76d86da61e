//! Lifecycle coordinator
//!
//! State machine, drain retry loop and the control loop that ties the
//! watchers to persistence and retirement.

pub mod control;
pub mod drain;
pub mod state;

pub use control::{Collaborators, Coordinator, ShutdownReport};
pub use drain::{drain_cluster, DrainOutcome, DrainPolicy};
pub use state::CoordinatorState;
