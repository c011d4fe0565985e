//! Subscription / upstream order link table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions_upstream_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub subscription_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub upstream_order_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::subscription::Column::Id"
    )]
    Subscription,
    #[sea_orm(
        belongs_to = "super::upstream_order::Entity",
        from = "Column::UpstreamOrderId",
        to = "super::upstream_order::Column::Id"
    )]
    UpstreamOrder,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::upstream_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UpstreamOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
