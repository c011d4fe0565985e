//! Upstream order: the result of one successful collection order
//! placed with the distributor. Shared between subscriptions so the
//! same (usage point, order kind) is never ordered twice while an
//! order is still valid.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The eight upstream order kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "subscription_call_type")]
pub enum SubscriptionCallType {
    #[sea_orm(string_value = "CONSUMPTION_IDX")]
    ConsumptionIdx,
    #[sea_orm(string_value = "CONSUMPTION_CDC_RAW")]
    ConsumptionCdcRaw,
    #[sea_orm(string_value = "CONSUMPTION_CDC_CORRECTED")]
    ConsumptionCdcCorrected,
    #[sea_orm(string_value = "CONSUMPTION_CDC_ENABLE")]
    ConsumptionCdcEnable,
    #[sea_orm(string_value = "PRODUCTION_IDX")]
    ProductionIdx,
    #[sea_orm(string_value = "PRODUCTION_CDC_RAW")]
    ProductionCdcRaw,
    #[sea_orm(string_value = "PRODUCTION_CDC_CORRECTED")]
    ProductionCdcCorrected,
    #[sea_orm(string_value = "PRODUCTION_CDC_ENABLE")]
    ProductionCdcEnable,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upstream_orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub webservices_call_id: i32,
    pub consent_expires_at: DateTimeWithTimeZone,
    pub call_type: SubscriptionCallType,
    /// Identifier returned by the distributor, needed to cancel the
    /// order later.
    pub call_id: i32,
    pub expires_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::webservices_call::Entity",
        from = "Column::WebservicesCallId",
        to = "super::webservices_call::Column::Id"
    )]
    WebservicesCall,
}

impl Related<super::webservices_call::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WebservicesCall.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        super::subscription_order::Relation::Subscription.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::subscription_order::Relation::UpstreamOrder.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
