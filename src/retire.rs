//! Node retirement
//!
//! The last step of finalize: make this instance go away.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{KillMode, WardenConfig};
use crate::error::{Result, WardenError};

/// Retires the node once its data is safe
#[async_trait]
pub trait NodeRetirer: Send + Sync {
    /// Invoked exactly once, after the snapshot attempt
    async fn kill_instance(&self) -> Result<()>;
}

/// Retirer driven by [`KillMode`]
#[derive(Debug, Clone)]
pub struct CommandRetirer {
    mode: KillMode,
    command: String,
}

impl CommandRetirer {
    pub fn new(mode: KillMode, command: impl Into<String>) -> Self {
        Self {
            mode,
            command: command.into(),
        }
    }

    pub fn from_config(config: &WardenConfig) -> Self {
        Self::new(config.kill_mode, config.shutdown_command.clone())
    }
}

#[async_trait]
impl NodeRetirer for CommandRetirer {
    async fn kill_instance(&self) -> Result<()> {
        match self.mode {
            KillMode::NoOp => {
                info!("kill mode is no-op, leaving instance running");
                Ok(())
            }
            KillMode::ShutdownCommand => {
                let failed = |reason: String| WardenError::ShutdownCommand {
                    command: self.command.clone(),
                    reason,
                };

                let mut parts = self.command.split_whitespace();
                let program = parts.next().ok_or_else(|| failed("empty command".into()))?;

                info!(command = %self.command, "running shutdown command");
                let status = Command::new(program)
                    .args(parts)
                    .status()
                    .await
                    .map_err(|e| failed(e.to_string()))?;

                if status.success() {
                    Ok(())
                } else {
                    warn!(command = %self.command, %status, "shutdown command failed");
                    Err(failed(format!("exited with {}", status)))
                }
            }
        }
    }
}
