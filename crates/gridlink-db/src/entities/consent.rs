//! Consent entity.
//!
//! A consent authorizes the cartesian product of its linked users and
//! linked usage points over the half-open window
//! `[begins_at, expires_at)`. Open consents additionally let the
//! resolver append usage points to their scope on first use.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "consent_issuer_type")]
pub enum ConsentIssuerType {
    #[sea_orm(string_value = "INDIVIDUAL")]
    Individual,
    #[sea_orm(string_value = "COMPANY")]
    Company,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub issuer_name: String,
    pub issuer_type: ConsentIssuerType,
    pub is_open: bool,
    pub begins_at: DateTimeWithTimeZone,
    pub expires_at: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Half-open window check.
    pub fn is_valid_at(&self, at: DateTimeWithTimeZone) -> bool {
        self.begins_at <= at && at < self.expires_at
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consent_usage_point::Entity")]
    UsagePointLinks,
    #[sea_orm(has_many = "super::webservices_call::Entity")]
    WebservicesCalls,
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,
}

impl Related<super::consent_usage_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsagePointLinks.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        super::consent_user::Relation::User.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::consent_user::Relation::Consent.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn consent(begins: &str, expires: &str) -> Model {
        Model {
            id: 1,
            issuer_name: "Simpson".to_string(),
            issuer_type: ConsentIssuerType::Individual,
            is_open: false,
            begins_at: DateTime::parse_from_rfc3339(begins).unwrap(),
            expires_at: DateTime::parse_from_rfc3339(expires).unwrap(),
            created_at: DateTime::parse_from_rfc3339(begins).unwrap(),
        }
    }

    #[test]
    fn window_is_half_open() {
        let c = consent("2020-01-01T00:00:00+01:00", "2021-01-01T00:00:00+01:00");
        assert!(c.is_valid_at(DateTime::parse_from_rfc3339("2020-01-01T00:00:00+01:00").unwrap()));
        assert!(c.is_valid_at(DateTime::parse_from_rfc3339("2020-06-15T12:00:00+02:00").unwrap()));
        assert!(!c.is_valid_at(DateTime::parse_from_rfc3339("2021-01-01T00:00:00+01:00").unwrap()));
        assert!(!c.is_valid_at(DateTime::parse_from_rfc3339("2019-12-31T23:59:59+01:00").unwrap()));
    }
}
