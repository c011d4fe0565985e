//! Immutable audit record of an attempted distributor call.
//!
//! Rows are inserted with a NULL status before the network is touched
//! and updated exactly once to a terminal status. The consent window
//! is denormalized so the schema's composite foreign key can hold the
//! integrity check.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "webservices_call_status")]
pub enum WebservicesCallStatus {
    #[sea_orm(string_value = "OK")]
    Ok,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webservices_calls")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub webservice: String,
    pub usage_point_id: String,
    pub user_id: String,
    pub consent_id: i32,
    pub consent_begins_at: DateTimeWithTimeZone,
    pub consent_expires_at: DateTimeWithTimeZone,
    pub called_at: DateTimeWithTimeZone,
    pub status: Option<WebservicesCallStatus>,
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
    #[sea_orm(has_many = "super::upstream_order::Entity")]
    UpstreamOrders,
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
        Relation::UpstreamOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
