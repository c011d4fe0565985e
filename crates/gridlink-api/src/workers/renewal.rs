//! Periodic renewal worker.
//!
//! Re-issues the upstream orders subscriptions are missing (when a
//! valid consent still covers them) and collects orders no
//! subscription uses any more.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tracing::info;

use gridlink_sge::SgeServices;

use crate::coordinator;

pub struct RenewalWorker {
    db: DatabaseConnection,
    sge: Arc<dyn SgeServices>,
    interval: Duration,
}

impl RenewalWorker {
    pub fn new(db: DatabaseConnection, sge: Arc<dyn SgeServices>, interval: Duration) -> Self {
        Self { db, sge, interval }
    }

    /// Run one pass immediately, then on every interval tick.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            info!("Renewal pass starting");
            coordinator::renew_subscriptions(&self.db, self.sge.as_ref()).await;
            coordinator::collect_unused_orders(&self.db, self.sge.as_ref()).await;
            info!("Renewal pass done");
        }
    }
}
