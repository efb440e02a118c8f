use api_types::Currency;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPreferences {
    pub telegram_id: i64,
    /// Short BCP-47 code (`ru`, `en`); empty when never chosen.
    pub language: String,
    pub default_currency: Option<Currency>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPreferences {
    #[must_use]
    pub fn new(telegram_id: i64) -> Self {
        Self {
            telegram_id,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_preferences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub telegram_id: i64,
    pub language: String,
    pub default_currency: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UserPreferences {
    fn from(model: Model) -> Self {
        // Unknown codes from older rows read as "not set".
        let default_currency = Currency::try_from(model.default_currency.as_str()).ok();
        Self {
            telegram_id: model.telegram_id,
            language: model.language,
            default_currency,
            updated_at: Some(model.updated_at),
        }
    }
}
