//! Child process handle

use async_trait::async_trait;
use tokio::process::Child;
use tracing::debug;

use crate::error::{Result, WardenError};
use crate::event::ExitInfo;

/// A running game server
#[async_trait]
pub trait ServerProcess: Send {
    /// Wait for the process to exit.
    ///
    /// Must be cancel-safe: dropping the future and calling `wait` again
    /// resumes waiting without losing the exit status.
    async fn wait(&mut self) -> Result<ExitInfo>;

    /// Begin forced termination without waiting for it to take effect
    fn start_kill(&mut self) -> Result<()>;

    /// OS process id, if still known
    fn id(&self) -> Option<u32>;
}

/// [`ServerProcess`] backed by a tokio child
#[derive(Debug)]
pub struct TokioServerProcess {
    child: Child,
}

impl TokioServerProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

#[async_trait]
impl ServerProcess for TokioServerProcess {
    async fn wait(&mut self) -> Result<ExitInfo> {
        let status = self.child.wait().await.map_err(|e| WardenError::ProcessControl {
            message: format!("wait failed: {}", e),
        })?;
        Ok(ExitInfo::from(status))
    }

    fn start_kill(&mut self) -> Result<()> {
        debug!(pid = ?self.child.id(), "sending kill to game server");
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already reaped: nothing left to kill
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(WardenError::ProcessControl {
                message: format!("kill failed: {}", e),
            }),
        }
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}
