//! Subscription repository and the notification-check scope.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use std::fmt::Display;

use crate::entities::{
    consent, subscription, subscription_order, upstream_order, SubscriptionStatus,
};
use crate::error::{is_integrity_violation, DbError, Result};
use crate::now_local;
use sea_orm::prelude::DateTimeWithTimeZone;

pub struct SubscriptionRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> SubscriptionRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find(
        &self,
        user_id: &str,
        usage_point_id: &str,
        series_name: &str,
    ) -> Result<Option<subscription::Model>> {
        Ok(subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::UsagePointId.eq(usage_point_id))
            .filter(subscription::Column::SeriesName.eq(series_name))
            .one(self.db)
            .await?)
    }

    pub async fn create(
        &self,
        user_id: &str,
        usage_point_id: &str,
        series_name: &str,
        consent: &consent::Model,
    ) -> Result<subscription::Model> {
        let active = subscription::ActiveModel {
            user_id: Set(user_id.to_string()),
            usage_point_id: Set(usage_point_id.to_string()),
            series_name: Set(series_name.to_string()),
            subscribed_at: Set(now_local()),
            notified_at: Set(None),
            consent_id: Set(consent.id),
            consent_begins_at: Set(consent.begins_at),
            consent_expires_at: Set(consent.expires_at),
            status: Set(None),
            error: Set(None),
            ..Default::default()
        };
        active.insert(self.db).await.map_err(|e| {
            if is_integrity_violation(&e) {
                DbError::NotAuthorized(e.to_string())
            } else {
                DbError::Db(e)
            }
        })
    }

    pub async fn all(&self) -> Result<Vec<subscription::Model>> {
        Ok(subscription::Entity::find().all(self.db).await?)
    }

    pub async fn of_user(&self, user_id: &str) -> Result<Vec<subscription::Model>> {
        Ok(subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .all(self.db)
            .await?)
    }

    /// Subscriptions of a user for one usage point, optionally
    /// narrowed to series names starting with `series_prefix`.
    pub async fn matching(
        &self,
        user_id: &str,
        usage_point_id: &str,
        series_prefix: Option<&str>,
    ) -> Result<Vec<subscription::Model>> {
        let subscriptions = subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::UsagePointId.eq(usage_point_id))
            .all(self.db)
            .await?;
        Ok(subscriptions
            .into_iter()
            .filter(|s| {
                series_prefix.map_or(true, |prefix| s.series_name.starts_with(prefix))
            })
            .collect())
    }

    /// Unlink from upstream orders and delete. The orders themselves
    /// stay behind; orphans are collected separately.
    pub async fn delete(&self, subscription: subscription::Model) -> Result<()> {
        subscription_order::Entity::delete_many()
            .filter(subscription_order::Column::SubscriptionId.eq(subscription.id))
            .exec(self.db)
            .await?;
        subscription.delete(self.db).await?;
        Ok(())
    }

    /// Re-point the denormalized consent reference, e.g. after a
    /// renewal resolved a newer consent.
    pub async fn update_consent(
        &self,
        subscription: subscription::Model,
        consent: &consent::Model,
    ) -> Result<subscription::Model> {
        let mut active: subscription::ActiveModel = subscription.into();
        active.consent_id = Set(consent.id);
        active.consent_begins_at = Set(consent.begins_at);
        active.consent_expires_at = Set(consent.expires_at);
        Ok(active.update(self.db).await?)
    }

    pub async fn link_order(&self, subscription_id: i32, upstream_order_id: i32) -> Result<()> {
        let existing = subscription_order::Entity::find_by_id((subscription_id, upstream_order_id))
            .one(self.db)
            .await?;
        if existing.is_none() {
            subscription_order::ActiveModel {
                subscription_id: Set(subscription_id),
                upstream_order_id: Set(upstream_order_id),
            }
            .insert(self.db)
            .await?;
        }
        Ok(())
    }

    pub async fn linked_orders(
        &self,
        subscription: &subscription::Model,
    ) -> Result<Vec<upstream_order::Model>> {
        Ok(subscription
            .find_related(upstream_order::Entity)
            .all(self.db)
            .await?)
    }
}

/// Notification-check scope.
///
/// Mirrors the guarded call: before delivering to a subscriber, the
/// status is cleared and `notified_at` updated, which re-validates
/// against the consent window at the store; after the send, the
/// terminal status is committed.
#[derive(Debug)]
pub struct NotificationCheck {
    subscription: subscription::Model,
}

impl NotificationCheck {
    pub async fn begin(
        db: &DatabaseConnection,
        subscription: subscription::Model,
        notified_at: DateTimeWithTimeZone,
    ) -> Result<Self> {
        let mut active: subscription::ActiveModel = subscription.into();
        active.status = Set(None);
        active.notified_at = Set(Some(notified_at));
        let subscription = active.update(db).await.map_err(|e| {
            if is_integrity_violation(&e) {
                DbError::NotAuthorized(e.to_string())
            } else {
                DbError::Db(e)
            }
        })?;
        Ok(NotificationCheck { subscription })
    }

    pub fn subscription(&self) -> &subscription::Model {
        &self.subscription
    }

    pub async fn complete<E: Display>(
        self,
        db: &DatabaseConnection,
        result: &std::result::Result<(), E>,
    ) -> Result<subscription::Model> {
        let mut active: subscription::ActiveModel = self.subscription.into();
        match result {
            Ok(()) => {
                active.status = Set(Some(SubscriptionStatus::Ok));
                active.error = Set(None);
            }
            Err(error) => {
                active.status = Set(Some(SubscriptionStatus::Failed));
                active.error = Set(Some(error.to_string()));
            }
        }
        Ok(active.update(db).await?)
    }
}
