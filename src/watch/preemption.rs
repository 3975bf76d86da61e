//! Spot reclamation notice polling

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cloud::MetadataClient;
use crate::error::Result;
use crate::event::{Event, EventEmitter};

/// Source of the provider's termination notice
#[async_trait]
pub trait TerminationNotice: Send + Sync {
    /// `Ok(true)` once a termination is scheduled for this instance
    async fn termination_scheduled(&self) -> Result<bool>;
}

#[async_trait]
impl TerminationNotice for MetadataClient {
    async fn termination_scheduled(&self) -> Result<bool> {
        MetadataClient::termination_scheduled(self).await
    }
}

/// Emits [`Event::PreemptionNoticed`] when a termination notice appears
pub struct PreemptionWatcher {
    source: Arc<dyn TerminationNotice>,
    period: Duration,
}

impl PreemptionWatcher {
    pub fn new(source: Arc<dyn TerminationNotice>, period: Duration) -> Self {
        Self {
            source,
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub async fn run(self, emitter: EventEmitter) -> bool {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.source.termination_scheduled().await {
                Ok(true) => {
                    info!("termination notice received");
                    break;
                }
                Ok(false) => debug!("no termination scheduled"),
                // A failed poll is never a notice
                Err(e) => warn!(error = %e, "termination notice poll failed"),
            }
        }

        emitter.emit(Event::PreemptionNoticed).await
    }
}
