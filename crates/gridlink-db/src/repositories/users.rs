//! User repository.

use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::user;
use crate::error::Result;

pub struct UserRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find(&self, bare_jid: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find_by_id(bare_jid).one(self.db).await?)
    }

    pub async fn create(&self, bare_jid: &str) -> Result<user::Model> {
        let active = user::ActiveModel {
            bare_jid: Set(bare_jid.to_string()),
        };
        Ok(active.insert(self.db).await?)
    }
}
