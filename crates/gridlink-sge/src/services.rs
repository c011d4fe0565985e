//! Mockable facade over the four bus operations.
//!
//! Handlers and the subscription coordinator depend on this trait
//! rather than on [`SgeClient`] so tests can substitute a double and
//! verify, among other things, that de-duplicated orders issue no
//! network call at all.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use gridlink_core::record::Data;

use crate::client::SgeClient;
use crate::error::SgeError;
use crate::types::{SubscribeRequest, TechnicalData};

#[async_trait]
pub trait SgeServices: Send + Sync {
    async fn history(
        &self,
        series_name: &str,
        usage_point_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Data, SgeError>;

    async fn technical_data(&self, usage_point_id: &str) -> Result<TechnicalData, SgeError>;

    /// Returns the order id assigned by the bus.
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<i32, SgeError>;

    async fn unsubscribe(&self, usage_point_id: &str, call_id: i32) -> Result<(), SgeError>;
}

#[async_trait]
impl SgeServices for SgeClient {
    async fn history(
        &self,
        series_name: &str,
        usage_point_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Data, SgeError> {
        SgeClient::history(self, series_name, usage_point_id, start, end).await
    }

    async fn technical_data(&self, usage_point_id: &str) -> Result<TechnicalData, SgeError> {
        SgeClient::technical_data(self, usage_point_id).await
    }

    async fn subscribe(&self, request: &SubscribeRequest) -> Result<i32, SgeError> {
        SgeClient::subscribe(self, request).await
    }

    async fn unsubscribe(&self, usage_point_id: &str, call_id: i32) -> Result<(), SgeError> {
        SgeClient::unsubscribe(self, usage_point_id, call_id).await
    }
}
