//! Cluster drain
//!
//! Scale the owning group to zero so the autoscaler does not replace this
//! node once it retires. Bounded retries with exponential backoff; running
//! out of attempts is reported, never fatal.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::cloud::ClusterControl;
use crate::config::WardenConfig;
use crate::metrics::standard;

/// Upper bound on the delay between attempts
pub const MAX_DRAIN_DELAY: Duration = Duration::from_secs(30);

/// How the drain step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainOutcome {
    /// Not attempted (no group configured, or the trigger does not drain)
    #[default]
    Skipped,
    /// Capacity set to zero
    Succeeded { attempts: u32 },
    /// Every attempt failed
    Exhausted { attempts: u32 },
    /// Abandoned because the child exited mid-drain
    Interrupted { attempts: u32 },
}

impl DrainOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DrainOutcome::Skipped => 0,
            DrainOutcome::Succeeded { attempts }
            | DrainOutcome::Exhausted { attempts }
            | DrainOutcome::Interrupted { attempts } => *attempts,
        }
    }
}

/// Attempt budget and backoff for the drain call
#[derive(Debug, Clone, Copy)]
pub struct DrainPolicy {
    /// Total calls, including the first
    pub attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Delay cap
    pub max_delay: Duration,
}

impl DrainPolicy {
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            attempts: config.retry_count.max(1),
            base_delay: config.drain_retry_delay,
            max_delay: MAX_DRAIN_DELAY,
        }
    }

    /// Delay after failed attempt `n` (0-indexed): `base × 2^n`, capped
    pub fn delay_after(&self, failure: u32) -> Duration {
        let factor = 1u32.checked_shl(failure).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Set `group`'s desired capacity to zero, retrying per `policy`.
///
/// `attempts` is updated before every call so a caller that abandons the
/// future still knows how far it got.
pub async fn drain_cluster(
    cluster: &dyn ClusterControl,
    group: &str,
    policy: DrainPolicy,
    attempts: &mut u32,
) -> DrainOutcome {
    info!(group, max = policy.attempts, "setting cluster capacity to 0");

    for attempt in 1..=policy.attempts {
        *attempts = attempt;
        standard::DRAIN_ATTEMPTS.inc();

        match cluster.set_desired_capacity(group, 0).await {
            Ok(()) => {
                info!(group, attempt, "cluster capacity set to 0");
                return DrainOutcome::Succeeded { attempts: attempt };
            }
            Err(e) => {
                standard::DRAIN_FAILURES.inc();
                warn!(
                    group,
                    attempt,
                    max = policy.attempts,
                    error = %e,
                    kind = e.as_label(),
                    retryable = e.is_retryable(),
                    "set desired capacity failed"
                );
                if attempt < policy.attempts {
                    sleep(policy.delay_after(attempt - 1)).await;
                }
            }
        }
    }

    error!(
        group,
        attempts = policy.attempts,
        "cluster drain exhausted retries, continuing node shutdown"
    );
    DrainOutcome::Exhausted {
        attempts: policy.attempts,
    }
}
