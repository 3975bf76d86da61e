//! Maximum uptime deadline

use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::event::{Event, EventEmitter};

/// Emits [`Event::UptimeExceeded`] once `limit` has elapsed
#[derive(Debug, Clone, Copy)]
pub struct UptimeWatcher {
    limit: Duration,
}

impl UptimeWatcher {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub async fn run(self, emitter: EventEmitter) -> bool {
        sleep(self.limit).await;
        info!(limit_secs = self.limit.as_secs(), "uptime exceeded limit");
        emitter.emit(Event::UptimeExceeded).await
    }
}
