//! Fan-out of parsed records to subscriptions.
//!
//! For each active subscription the matching records are grouped by
//! metadata, chunked, and sent inside a notification-check scope:
//! the ledger re-validates that the notification instant still falls
//! in the consent window before the send, and records the terminal
//! status after it. Chunks of one subscription are delivered in
//! parser emission order; failures stop that subscription's run and
//! leave it FAILED for the next pass.

use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use gridlink_core::identifier::record_name;
use gridlink_core::record::Data;
use gridlink_db::repositories::{NotificationCheck, SubscriptionRepository};
use gridlink_db::now_local;

use crate::error::StreamError;
use crate::gateway::DataSender;
use crate::grouping::RecordsByName;
use crate::throttle::Throttle;

pub struct Publisher<'a> {
    pub db: &'a DatabaseConnection,
    pub sender: &'a dyn DataSender,
    pub throttle: &'a Throttle,
    pub chunk_size: usize,
    /// Restrict delivery to one recipient (replay mode).
    pub user_filter: Option<String>,
}

impl<'a> Publisher<'a> {
    pub async fn fan_out(&self, records: &RecordsByName) -> Result<(), StreamError> {
        if records.is_empty() {
            return Ok(());
        }

        let subscriptions = SubscriptionRepository::new(self.db).all().await?;
        for mut subscription in subscriptions {
            if let Some(only) = &self.user_filter {
                if only != &subscription.user_id {
                    continue;
                }
            }

            let prefix = record_name(&subscription.usage_point_id, &subscription.series_name);
            let groups = records.get(&prefix, self.chunk_size);
            if groups.is_empty() {
                continue;
            }

            info!(
                user_id = %subscription.user_id,
                %prefix,
                chunks = groups.len(),
                "Delivering records"
            );

            for (metadata, chunk) in groups {
                let chunk_len = chunk.len();
                let check =
                    match NotificationCheck::begin(self.db, subscription.clone(), now_local())
                        .await
                    {
                        Ok(check) => check,
                        Err(error) => {
                            // The ledger refused the notification,
                            // typically because the consent window
                            // closed; leave the subscription alone.
                            warn!(
                                subscription_id = subscription.id,
                                %error,
                                "Notification check refused"
                            );
                            break;
                        }
                    };

                let data = Data::new(metadata, chunk);
                let result = self
                    .sender
                    .send(&check.subscription().user_id, &data)
                    .await;
                let failed = result.is_err();

                subscription = check.complete(self.db, &result).await?;
                self.throttle.acquire(chunk_len).await;

                if failed {
                    warn!(
                        subscription_id = subscription.id,
                        error = subscription.error.as_deref().unwrap_or(""),
                        "Delivery failed, will retry on next run"
                    );
                    break;
                }
            }
        }
        Ok(())
    }
}
