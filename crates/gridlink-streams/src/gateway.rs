//! Delivery through the messaging gateway.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use gridlink_core::record::Data;

use crate::error::StreamError;

/// Outbound delivery of one `Data` payload to a subscriber.
#[async_trait]
pub trait DataSender: Send + Sync {
    async fn send(&self, to: &str, data: &Data) -> Result<(), StreamError>;
}

#[derive(Serialize)]
struct Delivery<'a> {
    from: &'a str,
    to: &'a str,
    payload: String,
}

/// Sends payloads through the messaging gateway's deliver endpoint;
/// the gateway routes them to the subscriber's session.
pub struct GatewaySender {
    client: reqwest::Client,
    deliver_url: String,
    from_jid: String,
}

impl GatewaySender {
    pub fn new(gateway_url: &str, from_jid: &str) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StreamError::Delivery(e.to_string()))?;
        Ok(GatewaySender {
            client,
            deliver_url: format!("{}/deliver", gateway_url.trim_end_matches('/')),
            from_jid: from_jid.to_string(),
        })
    }
}

#[async_trait]
impl DataSender for GatewaySender {
    async fn send(&self, to: &str, data: &Data) -> Result<(), StreamError> {
        let payload = data
            .to_xml()
            .map_err(|e| StreamError::Delivery(e.to_string()))?;
        let response = self
            .client
            .post(&self.deliver_url)
            .json(&Delivery {
                from: &self.from_jid,
                to,
                payload,
            })
            .send()
            .await
            .map_err(|e| StreamError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StreamError::Delivery(format!(
                "gateway answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}
