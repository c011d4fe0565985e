//! User entity. Users are identified by the bare identity the
//! messaging gateway authenticates them under.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub bare_jid: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::webservices_call::Entity")]
    WebservicesCalls,
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,
}

impl Related<super::webservices_call::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WebservicesCalls.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl Related<super::consent::Entity> for Entity {
    fn to() -> RelationDef {
        super::consent_user::Relation::Consent.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::consent_user::Relation::User.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
