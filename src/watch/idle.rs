//! Player inactivity detection
//!
//! The server rewrites per-player files while anyone is online, so the mtime
//! of the player data directory is a cheap activity clock.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::WardenConfig;
use crate::event::{Event, EventEmitter};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Emits [`Event::IdleTimeoutReached`] once the watched path goes stale
#[derive(Debug, Clone)]
pub struct IdleWatcher {
    path: PathBuf,
    max_idle: Duration,
    grace: Duration,
    period: Duration,
}

impl IdleWatcher {
    /// Watch `config.idle_watch_path` inside `workdir`
    pub fn new(config: &WardenConfig, workdir: &Path) -> Self {
        Self::with_timing(
            workdir.join(&config.idle_watch_path),
            config.max_idle,
            config.idle_watch_grace,
            config.idle_sample_period(),
        )
    }

    pub fn with_timing(path: PathBuf, max_idle: Duration, grace: Duration, period: Duration) -> Self {
        Self {
            path,
            max_idle,
            grace,
            period: period.max(MIN_PERIOD),
        }
    }

    /// Time since the watched path was last modified
    async fn idle_for(&self) -> std::io::Result<Duration> {
        let modified = tokio::fs::metadata(&self.path).await?.modified()?;
        // An mtime in the future counts as fresh activity
        Ok(SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default())
    }

    /// Wait out the grace period, then sample until the idle limit is exceeded
    pub async fn run(self, emitter: EventEmitter) -> bool {
        info!(
            grace_secs = self.grace.as_secs_f64(),
            path = %self.path.display(),
            "idle watcher waiting for grace period"
        );
        sleep(self.grace).await;

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.idle_for().await {
                Ok(idle) if idle > self.max_idle => {
                    info!(
                        idle_secs = idle.as_secs(),
                        limit_secs = self.max_idle.as_secs(),
                        "idle time exceeded limit"
                    );
                    break;
                }
                Ok(idle) => {
                    debug!(idle_secs = idle.as_secs(), path = %self.path.display(), "idle sample");
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "idle sample skipped");
                }
            }
        }

        emitter.emit(Event::IdleTimeoutReached).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;

    #[tokio::test]
    async fn test_missing_path_is_never_idle() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = IdleWatcher::with_timing(
            dir.path().join("absent"),
            Duration::ZERO,
            Duration::ZERO,
            Duration::from_millis(5),
        );
        let (emitter, mut rx) = event::channel();
        let task = tokio::spawn(watcher.run(emitter));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
        task.abort();
    }

    #[tokio::test]
    async fn test_future_mtime_counts_as_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let file = std::fs::File::create(dir.path().join("p.dat")).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();

        let watcher = IdleWatcher::with_timing(
            dir.path().join("p.dat"),
            Duration::from_secs(1),
            Duration::ZERO,
            Duration::from_millis(5),
        );
        assert_eq!(watcher.idle_for().await.unwrap(), Duration::ZERO);
    }
}
