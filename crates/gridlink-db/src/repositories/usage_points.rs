//! Usage point repository.

use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::{usage_point, UsagePointSegment};
use crate::error::{DbError, Result};

pub struct UsagePointRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UsagePointRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find(&self, id: &str) -> Result<Option<usage_point::Model>> {
        Ok(usage_point::Entity::find_by_id(id).one(self.db).await?)
    }

    pub async fn get(&self, id: &str) -> Result<usage_point::Model> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("usage point {id}")))
    }

    pub async fn get_or_create(&self, id: &str) -> Result<usage_point::Model> {
        if let Some(existing) = self.find(id).await? {
            return Ok(existing);
        }
        let active = usage_point::ActiveModel {
            id: Set(id.to_string()),
            segment: Set(None),
            service_level: Set(None),
        };
        Ok(active.insert(self.db).await?)
    }

    /// Cache segment and service level from a technical-data fetch.
    pub async fn set_technical_data(
        &self,
        usage_point: usage_point::Model,
        segment: UsagePointSegment,
        service_level: Option<i32>,
    ) -> Result<usage_point::Model> {
        let mut active: usage_point::ActiveModel = usage_point.into();
        active.segment = Set(Some(segment));
        if service_level.is_some() {
            active.service_level = Set(service_level);
        }
        Ok(active.update(self.db).await?)
    }

    /// Whether the usage point belongs to the C5 segment. Stream
    /// parsers need this to re-stamp end-of-interval timestamps.
    pub async fn is_c5(&self, id: &str) -> Result<bool> {
        Ok(self
            .find(id)
            .await?
            .and_then(|up| up.segment)
            .map_or(true, |segment| segment == UsagePointSegment::C5))
    }
}
