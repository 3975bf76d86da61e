//! Spotwarden - lifecycle agent for a game server on a spot instance
//!
//! This crate keeps one preemptible node alive while its server is useful:
//! - Restoring the server's working directory from object storage
//! - Watching for idleness, uptime, preemption, signals and server exit
//! - Draining the owning autoscaling group
//! - Snapshotting the working directory and retiring the node

pub mod cloud;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod retire;
pub mod server;
pub mod storage;
pub mod watch;

pub use config::{KillMode, WardenConfig};
pub use coordinator::{Coordinator, CoordinatorState, ShutdownReport};
pub use error::{Result, WardenError};
pub use event::{Event, EventEmitter, ExitInfo};

/// Init script printed by `spotwarden init-script`
pub const INIT_SCRIPT: &str = include_str!("../assets/initscript.sh");
