//! Messaging gateway startup check.
//!
//! Both binaries bind to the gateway at startup; session setup gets a
//! bounded wait and failure aborts the process.

use std::time::Duration;

use crate::error::CoreError;

/// Poll the gateway health endpoint until it answers or the bounded
/// wait elapses.
pub async fn wait_for_gateway(gateway_url: &str, timeout: Duration) -> Result<(), CoreError> {
    let client = reqwest::Client::new();
    let url = format!("{}/health", gateway_url.trim_end_matches('/'));
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(%gateway_url, "Messaging gateway is up");
                return Ok(());
            }
            _ if tokio::time::Instant::now() >= deadline => {
                return Err(CoreError::Gateway(format!(
                    "messaging gateway did not answer within {timeout:?}"
                )));
            }
            _ => tokio::time::sleep(Duration::from_millis(500)).await,
        }
    }
}
