//! Game server supervision
//!
//! Starting the child server, waiting on it, and killing it on request.

pub mod kill;
pub mod launcher;
pub mod process;

pub use kill::{kill_channel, KillRequests, KillSwitch};
pub use launcher::{LaunchSpec, ServerLauncher};
pub use process::{ServerProcess, TokioServerProcess};
