//! Usage point entity: a metered delivery location, identified by its
//! 14-digit code. Segment and service level are cached from the first
//! technical-data fetch.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "usage_point_segment")]
pub enum UsagePointSegment {
    #[sea_orm(string_value = "C1")]
    C1,
    #[sea_orm(string_value = "C2")]
    C2,
    #[sea_orm(string_value = "C3")]
    C3,
    #[sea_orm(string_value = "C4")]
    C4,
    #[sea_orm(string_value = "C5")]
    C5,
    #[sea_orm(string_value = "P1")]
    P1,
    #[sea_orm(string_value = "P2")]
    P2,
    #[sea_orm(string_value = "P3")]
    P3,
    #[sea_orm(string_value = "P4")]
    P4,
}

impl UsagePointSegment {
    /// Linky-generation segments, which record load curves at 30 min.
    pub fn is_linky(&self) -> bool {
        matches!(self, UsagePointSegment::C5 | UsagePointSegment::P4)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "C1" => Some(Self::C1),
            "C2" => Some(Self::C2),
            "C3" => Some(Self::C3),
            "C4" => Some(Self::C4),
            "C5" => Some(Self::C5),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            "P4" => Some(Self::P4),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_points")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub segment: Option<UsagePointSegment>,
    pub service_level: Option<i32>,
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

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linky_segments() {
        assert!(UsagePointSegment::C5.is_linky());
        assert!(UsagePointSegment::P4.is_linky());
        assert!(!UsagePointSegment::C4.is_linky());
        assert!(!UsagePointSegment::P1.is_linky());
    }

    #[test]
    fn parse_segment() {
        assert_eq!(UsagePointSegment::parse("C5"), Some(UsagePointSegment::C5));
        assert_eq!(UsagePointSegment::parse("C6"), None);
    }
}
