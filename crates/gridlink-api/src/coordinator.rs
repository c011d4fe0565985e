//! Subscription coordinator.
//!
//! Maps client series onto the set of upstream order kinds they need,
//! reuses valid orders instead of placing duplicates, detects expired
//! orders for the renewal worker and collects orphaned ones.

use chrono::Duration;
use sea_orm::DatabaseConnection;
use thiserror::Error;
use tracing::{info, warn};

use gridlink_core::series;
use gridlink_db::repositories::{OrderRepository, SubscriptionRepository, UsagePointRepository};
use gridlink_db::{
    consent, now_local, resolve_consent, subscription, upstream_order, usage_point, user,
    DbError, GuardedCall, NewCall, SubscriptionCallType,
};
use gridlink_sge::types::{SUBSCRIBE_SERVICE, UNSUBSCRIBE_SERVICE};
use gridlink_sge::{SgeError, SgeServices, SubscribeRequest};
use sea_orm::prelude::DateTimeWithTimeZone;

/// Upstream orders are capped at one year even when the consent runs
/// longer.
const MAX_ORDER_DAYS: i64 = 365;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error(transparent)]
    Db(DbError),

    #[error(transparent)]
    Sge(#[from] SgeError),
}

impl From<DbError> for CoordinatorError {
    fn from(error: DbError) -> Self {
        if error.is_authorization_failure() {
            CoordinatorError::NotAuthorized(error.to_string())
        } else {
            CoordinatorError::Db(error)
        }
    }
}

/// The upstream order kinds one client series requires.
pub fn required_call_types(series_name: &str) -> &'static [SubscriptionCallType] {
    match series_name {
        series::CONSUMPTION_POWER_ACTIVE_RAW => &[
            SubscriptionCallType::ConsumptionCdcEnable,
            SubscriptionCallType::ConsumptionCdcRaw,
        ],
        series::CONSUMPTION_ENERGY_ACTIVE_INDEX | series::CONSUMPTION_POWER_APPARENT_MAX => {
            &[SubscriptionCallType::ConsumptionIdx]
        }
        _ => &[],
    }
}

/// Reuse a still-valid order for `(usage_point, call_type)` or place
/// a new one through a guarded call.
///
/// When an existing order is found, no distributor call is issued at
/// all; that is the de-duplication guarantee subscriptions rely on.
pub async fn get_or_call_upstream_order(
    db: &DatabaseConnection,
    sge: &dyn SgeServices,
    user: &user::Model,
    usage_point: &usage_point::Model,
    consent: &consent::Model,
    call_type: SubscriptionCallType,
) -> Result<upstream_order::Model, CoordinatorError> {
    let now = now_local();
    let orders = OrderRepository::new(db);

    if let Some(existing) = orders.find_existing(&usage_point.id, call_type, now).await? {
        info!(
            usage_point_id = %usage_point.id,
            call_type = ?call_type,
            order_id = existing.id,
            "Reusing existing upstream order"
        );
        return Ok(existing);
    }

    let expires_at = consent.expires_at.min(now + Duration::days(MAX_ORDER_DAYS));

    let guard = GuardedCall::record(
        db,
        NewCall::new(SUBSCRIBE_SERVICE, &user.bare_jid, &usage_point.id, consent),
    )
    .await?;
    let backing_call = guard.call().clone();

    let request = SubscribeRequest {
        usage_point_id: usage_point.id.clone(),
        call_type,
        expires_at,
        is_linky: usage_point.segment.map_or(false, |s| s.is_linky()),
        issuer_is_company: consent.issuer_type == gridlink_db::ConsentIssuerType::Company,
        issuer_name: consent.issuer_name.clone(),
    };

    let result = sge.subscribe(&request).await;
    let call_id = guard.complete(db, result).await??;

    Ok(orders
        .create(&backing_call, call_type, call_id, expires_at)
        .await?)
}

/// Required order kinds of a subscription for which no linked order
/// is still valid at `now`.
pub async fn expired_call_types(
    db: &DatabaseConnection,
    subscription: &subscription::Model,
    now: DateTimeWithTimeZone,
) -> Result<Vec<SubscriptionCallType>, DbError> {
    let linked = SubscriptionRepository::new(db)
        .linked_orders(subscription)
        .await?;
    Ok(required_call_types(&subscription.series_name)
        .iter()
        .copied()
        .filter(|call_type| {
            !linked
                .iter()
                .any(|order| order.call_type == *call_type && order.expires_at > now)
        })
        .collect())
}

/// One renewal pass: for every subscription missing a valid order,
/// re-resolve the consent and re-issue the missing kinds.
pub async fn renew_subscriptions(db: &DatabaseConnection, sge: &dyn SgeServices) {
    let subscriptions = match SubscriptionRepository::new(db).all().await {
        Ok(subscriptions) => subscriptions,
        Err(error) => {
            warn!(%error, "Renewal pass could not list subscriptions");
            return;
        }
    };

    for subscription in subscriptions {
        let now = now_local();
        let expired = match expired_call_types(db, &subscription, now).await {
            Ok(expired) => expired,
            Err(error) => {
                warn!(subscription_id = subscription.id, %error, "Skipping subscription");
                continue;
            }
        };
        if expired.is_empty() {
            continue;
        }

        let consent =
            match resolve_consent(db, &subscription.user_id, &subscription.usage_point_id, now)
                .await
            {
                Ok(consent) => consent,
                Err(error) => {
                    // No valid consent any more; the subscription
                    // stays until the user renews it.
                    warn!(
                        subscription_id = subscription.id,
                        usage_point_id = %subscription.usage_point_id,
                        %error,
                        "Cannot renew without a valid consent"
                    );
                    continue;
                }
            };

        info!(
            subscription_id = subscription.id,
            usage_point_id = %subscription.usage_point_id,
            series_name = %subscription.series_name,
            ?expired,
            consent_expires_at = %consent.expires_at,
            "Renewing upstream orders"
        );

        let repo = SubscriptionRepository::new(db);
        let subscription = match repo.update_consent(subscription, &consent).await {
            Ok(subscription) => subscription,
            Err(error) => {
                warn!(%error, "Could not re-point subscription consent");
                continue;
            }
        };

        let usage_point = match UsagePointRepository::new(db)
            .get(&subscription.usage_point_id)
            .await
        {
            Ok(usage_point) => usage_point,
            Err(error) => {
                warn!(%error, "Usage point disappeared");
                continue;
            }
        };
        let user = user::Model {
            bare_jid: subscription.user_id.clone(),
        };

        for call_type in expired {
            match get_or_call_upstream_order(db, sge, &user, &usage_point, &consent, call_type)
                .await
            {
                Ok(order) => {
                    if let Err(error) = repo.link_order(subscription.id, order.id).await {
                        warn!(%error, "Could not link renewed order");
                    }
                }
                Err(error) => warn!(subscription_id = subscription.id, %error, "Renewal failed"),
            }
            // Pace the bus between orders.
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }
}

/// Collect upstream orders no subscription uses any more. Orders are
/// cancelled upstream when a guarded call is still possible; the row
/// is deleted once the upstream side is cancelled or already expired.
pub async fn collect_unused_orders(db: &DatabaseConnection, sge: &dyn SgeServices) {
    let orders = OrderRepository::new(db);
    let unused = match orders.unused().await {
        Ok(unused) => unused,
        Err(error) => {
            warn!(%error, "Could not query unused orders");
            return;
        }
    };

    for order in unused {
        let now = now_local();
        let backing = match orders.backing_call(&order).await {
            Ok(Some(backing)) => backing,
            Ok(None) => {
                warn!(order_id = order.id, "Unused order without backing call");
                continue;
            }
            Err(error) => {
                warn!(%error, "Could not load backing call");
                continue;
            }
        };

        let cancelled = if order.expires_at <= now {
            true
        } else {
            let new_call = NewCall {
                webservice: UNSUBSCRIBE_SERVICE.to_string(),
                usage_point_id: backing.usage_point_id.clone(),
                user_id: backing.user_id.clone(),
                consent_id: backing.consent_id,
                consent_begins_at: backing.consent_begins_at,
                consent_expires_at: backing.consent_expires_at,
                called_at: now,
            };
            match GuardedCall::record(db, new_call).await {
                Ok(guard) => {
                    let result = sge.unsubscribe(&backing.usage_point_id, order.call_id).await;
                    match guard.complete(db, result).await {
                        Ok(Ok(())) => true,
                        Ok(Err(error)) => {
                            warn!(order_id = order.id, %error, "Upstream cancellation failed");
                            false
                        }
                        Err(error) => {
                            warn!(order_id = order.id, %error, "Could not record cancellation");
                            false
                        }
                    }
                }
                Err(error) => {
                    // Consent no longer covers a cancellation call;
                    // wait for the order to expire on its own.
                    warn!(order_id = order.id, %error, "Cancellation not authorized");
                    false
                }
            }
        };

        if cancelled {
            info!(order_id = order.id, call_id = order.call_id, "Deleting unused order");
            if let Err(error) = orders.delete(order).await {
                warn!(%error, "Could not delete unused order");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_curve_series_needs_enable_and_raw_orders() {
        assert_eq!(
            required_call_types("consumption/power/active/raw"),
            &[
                SubscriptionCallType::ConsumptionCdcEnable,
                SubscriptionCallType::ConsumptionCdcRaw,
            ]
        );
    }

    #[test]
    fn index_backed_series_share_one_order_kind() {
        assert_eq!(
            required_call_types("consumption/energy/active/index"),
            &[SubscriptionCallType::ConsumptionIdx]
        );
        assert_eq!(
            required_call_types("consumption/power/apparent/max"),
            &[SubscriptionCallType::ConsumptionIdx]
        );
    }

    #[test]
    fn unknown_series_need_nothing() {
        assert!(required_call_types("consumption/voltage/raw").is_empty());
    }
}
