//! Remote-service sessions, one per Telegram user.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Token pair and remote identity bound to a Telegram user.
///
/// A stored session always carries both tokens and both expiries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSession {
    pub telegram_id: i64,
    pub user_id: String,
    pub tenant_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSession {
    #[must_use]
    pub fn access_expired(&self, now: DateTime<Utc>) -> bool {
        self.access_expires_at <= now
    }

    #[must_use]
    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at <= now
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub telegram_id: i64,
    pub user_id: String,
    pub tenant_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTimeUtc,
    pub refresh_expires_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UserSession {
    fn from(model: Model) -> Self {
        Self {
            telegram_id: model.telegram_id,
            user_id: model.user_id,
            tenant_id: model.tenant_id,
            access_token: model.access_token,
            refresh_token: model.refresh_token,
            access_expires_at: model.access_expires_at,
            refresh_expires_at: model.refresh_expires_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
