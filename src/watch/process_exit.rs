//! Game server exit detection
//!
//! Owns the child process. Kill requests arrive over a [`KillRequests`]
//! stream so the coordinator never touches the handle directly.

use tracing::{error, info, warn};

use crate::event::{Event, EventEmitter, ExitInfo};
use crate::server::{KillRequests, ServerProcess};

/// Emits [`Event::ChildProcessExited`] when the server exits
pub struct ProcessExitWatcher {
    process: Box<dyn ServerProcess>,
    kills: KillRequests,
}

impl ProcessExitWatcher {
    pub fn new(process: Box<dyn ServerProcess>, kills: KillRequests) -> Self {
        Self { process, kills }
    }

    pub async fn run(mut self, emitter: EventEmitter) -> bool {
        let mut kills_open = true;
        let result = loop {
            tokio::select! {
                result = self.process.wait() => break result,
                request = self.kills.recv(), if kills_open => match request {
                    Some(()) => {
                        info!(pid = ?self.process.id(), "killing the game server");
                        if let Err(e) = self.process.start_kill() {
                            warn!(error = %e, "kill request failed");
                        }
                    }
                    None => kills_open = false,
                },
            }
        };

        let exit = match result {
            Ok(exit) => {
                info!(%exit, "game server process exited");
                exit
            }
            Err(e) => {
                error!(error = %e, "lost track of game server, treating as exited");
                ExitInfo {
                    code: None,
                    signal: None,
                }
            }
        };

        emitter.emit(Event::ChildProcessExited(exit)).await
    }
}
