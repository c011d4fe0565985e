//! Client subscription: a standing request for one series of one
//! usage point, fulfilled by one or more upstream orders.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "subscription_status")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "OK")]
    Ok,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: String,
    pub usage_point_id: String,
    pub series_name: String,
    pub subscribed_at: DateTimeWithTimeZone,
    pub notified_at: Option<DateTimeWithTimeZone>,
    pub consent_id: i32,
    pub consent_begins_at: DateTimeWithTimeZone,
    pub consent_expires_at: DateTimeWithTimeZone,
    pub status: Option<SubscriptionStatus>,
    pub error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::BareJid"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::usage_point::Entity",
        from = "Column::UsagePointId",
        to = "super::usage_point::Column::Id"
    )]
    UsagePoint,
    #[sea_orm(
        belongs_to = "super::consent::Entity",
        from = "Column::ConsentId",
        to = "super::consent::Column::Id"
    )]
    Consent,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::usage_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsagePoint.def()
    }
}

impl Related<super::consent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consent.def()
    }
}

impl Related<super::upstream_order::Entity> for Entity {
    fn to() -> RelationDef {
        super::subscription_order::Relation::UpstreamOrder.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::subscription_order::Relation::Subscription.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
