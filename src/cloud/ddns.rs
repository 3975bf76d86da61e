//! Dynamic DNS update ping

use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Hit the DDNS update URL once so the server's hostname follows this node.
///
/// Failures are logged and otherwise ignored.
pub async fn update_ddns(url: &str) {
    info!(url, "issuing DDNS update query");

    let client = match Client::builder().timeout(Duration::from_secs(10)).build() {
        Ok(c) => c,
        Err(e) => {
            warn!("DDNS client setup failed: {}", e);
            return;
        }
    };

    match client.get(url).send().await {
        Ok(resp) => info!(status = %resp.status(), "DDNS update query result"),
        Err(e) => warn!("DDNS update query failed: {}", e),
    }
}
