//! Game server launcher

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use super::process::TokioServerProcess;
use crate::config::WardenConfig;
use crate::error::{Result, WardenError};

/// Flag appended after the jar path
const SERVER_FLAG: &str = "nogui";

/// Everything needed to start the server
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Java executable
    pub java_path: PathBuf,
    /// Whitespace-separated JVM arguments
    pub java_args: String,
    /// Server jar
    pub jar: PathBuf,
}

impl LaunchSpec {
    pub fn new(config: &WardenConfig, jar: PathBuf) -> Self {
        Self {
            java_path: config.java_path.clone(),
            java_args: config.java_args.clone(),
            jar,
        }
    }

    /// Argument vector passed to the java executable
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self
            .java_args
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        args.push("-jar".into());
        args.push(self.jar.display().to_string());
        args.push(SERVER_FLAG.into());
        args
    }
}

/// Spawns the server as a child of this process
#[derive(Debug, Default, Clone)]
pub struct ServerLauncher;

impl ServerLauncher {
    /// Start the server inside `workdir` with inherited stdout/stderr
    pub fn start(&self, spec: &LaunchSpec, workdir: &Path) -> Result<TokioServerProcess> {
        let args = spec.build_args();
        info!(
            program = %spec.java_path.display(),
            args = ?args,
            workdir = %workdir.display(),
            "starting game server"
        );

        let child = Command::new(&spec.java_path)
            .args(&args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| WardenError::ProcessSpawn {
                program: spec.java_path.display().to_string(),
                source: e,
            })?;

        info!(pid = ?child.id(), "game server started");
        Ok(TokioServerProcess::new(child))
    }
}
