//! Kill requests from the coordinator to the process owner
//!
//! The process-exit watcher owns the child; the coordinator only holds a
//! [`KillSwitch`]. Requests coalesce, so asking twice is the same as once.

use tokio::sync::mpsc;
use tracing::debug;

/// Coordinator-side handle for requesting child termination
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: mpsc::Sender<()>,
}

/// Owner-side stream of kill requests
#[derive(Debug)]
pub struct KillRequests {
    rx: mpsc::Receiver<()>,
}

/// Create a connected switch/requests pair
pub fn kill_channel() -> (KillSwitch, KillRequests) {
    let (tx, rx) = mpsc::channel(1);
    (KillSwitch { tx }, KillRequests { rx })
}

impl KillSwitch {
    /// Ask the owner to kill the child. Never blocks.
    ///
    /// Returns `false` if the owner is gone (the child has already been reaped).
    pub fn request_kill(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("kill already pending");
                true
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

impl KillRequests {
    /// Next kill request; `None` once every switch is dropped
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_coalesce() {
        let (switch, mut requests) = kill_channel();
        assert!(switch.request_kill());
        assert!(switch.request_kill());
        assert_eq!(requests.recv().await, Some(()));

        drop(switch);
        assert_eq!(requests.recv().await, None);
    }

    #[test]
    fn test_request_after_owner_gone() {
        let (switch, requests) = kill_channel();
        drop(requests);
        assert!(!switch.request_kill());
    }
}
