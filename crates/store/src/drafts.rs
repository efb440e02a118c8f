//! Transaction drafts awaiting a category choice or a confirmation.

use api_types::{Currency, TransactionType};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::StoreError;

/// Not-yet-committed transaction. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionDraft {
    pub id: String,
    pub telegram_id: i64,
    pub kind: TransactionType,
    pub amount_minor: i64,
    pub currency: Currency,
    pub description: String,
    pub category_id: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transaction_drafts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub telegram_id: i64,
    pub tx_type: String,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub category_id: Option<String>,
    pub occurred_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for TransactionDraft {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: TransactionType::try_from(model.tx_type.as_str()).map_err(|reason| {
                StoreError::Corrupted {
                    column: "transaction_drafts.tx_type",
                    reason,
                }
            })?,
            currency: Currency::try_from(model.currency.as_str()).map_err(|err| {
                StoreError::Corrupted {
                    column: "transaction_drafts.currency",
                    reason: err.to_string(),
                }
            })?,
            id: model.id,
            telegram_id: model.telegram_id,
            amount_minor: model.amount_minor,
            description: model.description,
            category_id: model.category_id,
            occurred_at: model.occurred_at,
            created_at: model.created_at,
        })
    }
}
