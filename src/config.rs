//! Node configuration
//!
//! Built once at startup and shared read-only with every component.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, WardenError};

/// Environment variable prefix for all settings
pub const ENV_PREFIX: &str = "SPOTWARDEN_";

/// Default region for AWS endpoints
pub const DEFAULT_REGION: &str = "ap-northeast-1";

/// What `KillInstance` does once data has been snapshotted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KillMode {
    /// Leave the instance running (manual management, tests)
    #[default]
    NoOp,
    /// Run the configured OS shutdown command
    ShutdownCommand,
}

impl KillMode {
    /// Parse the `KILL_MODE` setting
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "noop" | "no-op" | "none" => Some(KillMode::NoOp),
            "shutdown" | "shutdown-command" | "command" => Some(KillMode::ShutdownCommand),
            _ => None,
        }
    }
}

/// Configuration for the lifecycle coordinator and its watchers
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Hard cap on node uptime before the cluster is drained
    pub max_uptime: Duration,
    /// Idle window after which the cluster is drained
    pub max_idle: Duration,
    /// Delay before the idle watcher takes its first sample
    pub idle_watch_grace: Duration,
    /// Path inside the working directory whose mtime tracks player activity
    pub idle_watch_path: PathBuf,
    /// Final retirement behaviour
    pub kill_mode: KillMode,
    /// OS command line run under `KillMode::ShutdownCommand`
    pub shutdown_command: String,
    /// Owning autoscaling group; `None` disables the drain step
    pub cluster_group: Option<String>,
    /// Number of drain attempts before giving up
    pub retry_count: u32,
    /// Base delay between drain attempts (doubles per attempt)
    pub drain_retry_delay: Duration,
    /// Cadence of the preemption notice poll
    pub preemption_poll_interval: Duration,
    /// Blob URL of the server binary
    pub server_jar_url: String,
    /// Blob URL of the seed (EULA) file used on first run
    pub seed_url: String,
    /// File name the seed is written to inside the working directory
    pub seed_file_name: String,
    /// Blob URL of the working directory snapshot
    pub data_url: String,
    /// Java executable
    pub java_path: PathBuf,
    /// Extra whitespace-separated JVM arguments
    pub java_args: String,
    /// Parent directory for the working directory and scratch files
    pub work_root: PathBuf,
    /// AWS region for S3 and autoscaling endpoints
    pub region: String,
    /// Optional DDNS update URL pinged at startup
    pub ddns_url: Option<String>,
    /// Optional bind address for the metrics endpoint
    pub metrics_addr: Option<String>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            max_uptime: Duration::from_secs(43_200),
            max_idle: Duration::from_secs(14_400),
            idle_watch_grace: Duration::from_secs(600),
            idle_watch_path: PathBuf::from("world/playerdata"),
            kill_mode: KillMode::NoOp,
            shutdown_command: "shutdown -h now".into(),
            cluster_group: None,
            retry_count: 3,
            drain_retry_delay: Duration::from_secs(1),
            preemption_poll_interval: Duration::from_secs(10),
            server_jar_url: String::new(),
            seed_url: String::new(),
            seed_file_name: "eula.txt".into(),
            data_url: String::new(),
            java_path: PathBuf::from("java"),
            java_args: String::new(),
            work_root: std::env::temp_dir(),
            region: DEFAULT_REGION.into(),
            ddns_url: None,
            metrics_addr: None,
        }
    }
}

impl WardenConfig {
    /// Load configuration from `SPOTWARDEN_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Load configuration from an arbitrary key lookup (keys without prefix)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| WardenError::Config {
                reason: format!("{ENV_PREFIX}{key} must be set"),
            })
        };
        let seconds = |key: &str, default: Duration| match get(key) {
            None => default,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!(key, value = %raw, "ignoring unparseable duration, using default");
                    default
                }
            },
        };

        let defaults = Self::default();

        let kill_mode = match get("KILL_MODE") {
            None => defaults.kill_mode,
            Some(raw) => KillMode::parse(&raw).ok_or_else(|| WardenError::Config {
                reason: format!("unknown {ENV_PREFIX}KILL_MODE `{raw}`"),
            })?,
        };

        let retry_count = match get("RETRY_COUNT") {
            None => defaults.retry_count,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "ignoring unparseable retry count, using default");
                defaults.retry_count
            }),
        };

        let config = Self {
            max_uptime: seconds("MAX_UPTIME", defaults.max_uptime),
            max_idle: seconds("MAX_IDLE_TIME", defaults.max_idle),
            idle_watch_grace: seconds("IDLE_WATCH_GRACE", defaults.idle_watch_grace),
            idle_watch_path: get("IDLE_WATCH_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.idle_watch_path),
            kill_mode,
            shutdown_command: get("SHUTDOWN_COMMAND").unwrap_or(defaults.shutdown_command),
            cluster_group: get("AUTOSCALING_GROUP"),
            retry_count,
            drain_retry_delay: defaults.drain_retry_delay,
            preemption_poll_interval: defaults.preemption_poll_interval,
            server_jar_url: required("SERVER_JAR_URL")?,
            seed_url: required("SEED_URL")?,
            seed_file_name: defaults.seed_file_name,
            data_url: required("DATA_URL")?,
            java_path: PathBuf::from(required("JAVA_PATH")?),
            java_args: get("JAVA_ARGS").unwrap_or_default(),
            work_root: get("WORK_ROOT").map(PathBuf::from).unwrap_or(defaults.work_root),
            region: get("AWS_REGION").unwrap_or(defaults.region),
            ddns_url: get("DDNS_UPDATE_URL"),
            metrics_addr: get("METRICS_ADDR"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        if self.retry_count == 0 {
            return Err(WardenError::Config {
                reason: "retry count must be at least 1".into(),
            });
        }
        if self.max_idle.is_zero() {
            return Err(WardenError::Config {
                reason: "max idle time must be positive".into(),
            });
        }
        if self.kill_mode == KillMode::ShutdownCommand && self.shutdown_command.trim().is_empty() {
            return Err(WardenError::Config {
                reason: "shutdown kill mode requires a shutdown command".into(),
            });
        }
        if self.idle_watch_path.is_absolute() {
            return Err(WardenError::Config {
                reason: "idle watch path must be relative to the working directory".into(),
            });
        }
        Ok(())
    }

    /// The group to drain, if cluster scale-down is enabled
    pub fn drain_group(&self) -> Option<&str> {
        self.cluster_group.as_deref().filter(|g| !g.is_empty())
    }

    /// Sampling period of the idle watcher: twelve samples per idle window
    pub fn idle_sample_period(&self) -> Duration {
        self.max_idle / 12
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("SERVER_JAR_URL", "s3://bucket/server.jar"),
        ("SEED_URL", "s3://bucket/eula.txt"),
        ("DATA_URL", "s3://bucket/world.tgz"),
        ("JAVA_PATH", "/usr/bin/java"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = WardenConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.max_uptime, Duration::from_secs(43_200));
        assert_eq!(config.max_idle, Duration::from_secs(14_400));
        assert_eq!(config.idle_watch_path, PathBuf::from("world/playerdata"));
        assert_eq!(config.kill_mode, KillMode::NoOp);
        assert_eq!(config.retry_count, 3);
        assert!(config.drain_group().is_none());
        assert_eq!(config.idle_sample_period(), Duration::from_secs(1_200));
    }

    #[test]
    fn test_missing_required_value() {
        let err = WardenConfig::from_lookup(lookup(&REQUIRED[..3])).unwrap_err();
        assert!(err.to_string().contains("JAVA_PATH"));
    }

    #[test]
    fn test_bad_number_falls_back() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_UPTIME", "soon"));
        pairs.push(("MAX_IDLE_TIME", "120"));
        let config = WardenConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.max_uptime, Duration::from_secs(43_200));
        assert_eq!(config.max_idle, Duration::from_secs(120));
    }

    #[test]
    fn test_kill_mode_and_group() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("KILL_MODE", "shutdown"));
        pairs.push(("AUTOSCALING_GROUP", "mc-asg"));
        let config = WardenConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.kill_mode, KillMode::ShutdownCommand);
        assert_eq!(config.drain_group(), Some("mc-asg"));

        pairs.push(("KILL_MODE", "explode"));
        assert!(WardenConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_zero_retry_rejected() {
        let config = WardenConfig {
            retry_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
