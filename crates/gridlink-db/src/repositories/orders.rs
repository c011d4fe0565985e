//! Upstream order repository.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, ModelTrait,
    QueryFilter, QuerySelect, RelationTrait, Set,
};

use crate::entities::{
    subscription_order, upstream_order, webservices_call, SubscriptionCallType,
};
use crate::error::Result;
use sea_orm::prelude::DateTimeWithTimeZone;

pub struct OrderRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> OrderRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// An order of the given kind for the usage point that is still
    /// valid at `now`, if one exists. Reusing it instead of placing a
    /// new one is what de-duplicates upstream orders.
    pub async fn find_existing(
        &self,
        usage_point_id: &str,
        call_type: SubscriptionCallType,
        now: DateTimeWithTimeZone,
    ) -> Result<Option<upstream_order::Model>> {
        Ok(upstream_order::Entity::find()
            .join(
                JoinType::InnerJoin,
                upstream_order::Relation::WebservicesCall.def(),
            )
            .filter(webservices_call::Column::UsagePointId.eq(usage_point_id))
            .filter(upstream_order::Column::CallType.eq(call_type))
            .filter(upstream_order::Column::ExpiresAt.gt(now))
            .one(self.db)
            .await?)
    }

    pub async fn create(
        &self,
        backing_call: &webservices_call::Model,
        call_type: SubscriptionCallType,
        call_id: i32,
        expires_at: DateTimeWithTimeZone,
    ) -> Result<upstream_order::Model> {
        let active = upstream_order::ActiveModel {
            webservices_call_id: Set(backing_call.id),
            consent_expires_at: Set(backing_call.consent_expires_at),
            call_type: Set(call_type),
            call_id: Set(call_id),
            expires_at: Set(expires_at),
            ..Default::default()
        };
        Ok(active.insert(self.db).await?)
    }

    /// Orders no subscription links to any more; eligible for
    /// upstream cancellation and deletion.
    pub async fn unused(&self) -> Result<Vec<upstream_order::Model>> {
        Ok(upstream_order::Entity::find()
            .join_rev(
                JoinType::LeftJoin,
                subscription_order::Relation::UpstreamOrder.def(),
            )
            .filter(subscription_order::Column::SubscriptionId.is_null())
            .all(self.db)
            .await?)
    }

    /// The audit call that placed the order, needed to cancel it with
    /// a consent trail.
    pub async fn backing_call(
        &self,
        order: &upstream_order::Model,
    ) -> Result<Option<webservices_call::Model>> {
        Ok(order
            .find_related(webservices_call::Entity)
            .one(self.db)
            .await?)
    }

    pub async fn delete(&self, order: upstream_order::Model) -> Result<()> {
        order.delete(self.db).await?;
        Ok(())
    }
}
