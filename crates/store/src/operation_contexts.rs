//! Operation contexts tie a rendered bot message to the draft behind it.
//!
//! Callback payloads are limited to 64 bytes, so keyboards that would carry
//! long category ids reference the operation instead and the ids are kept
//! here in `category_list`.

use api_types::{Currency, TransactionType};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::StoreError;

/// How the category of an operation was chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionSource {
    #[default]
    Manual,
    Keyword,
    Llm,
}

impl SelectionSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SelectionSource::Manual => "manual",
            SelectionSource::Keyword => "keyword",
            SelectionSource::Llm => "llm",
        }
    }
}

impl TryFrom<&str> for SelectionSource {
    type Error = StoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "manual" => Ok(SelectionSource::Manual),
            "keyword" => Ok(SelectionSource::Keyword),
            "llm" => Ok(SelectionSource::Llm),
            other => Err(StoreError::Corrupted {
                column: "operation_contexts.selection_source",
                reason: format!("unknown source {other}"),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationContext {
    pub op_id: String,
    pub telegram_id: i64,
    pub tenant_id: String,
    pub draft_id: Option<String>,
    pub transaction_id: Option<String>,
    pub description_original: String,
    pub category_id_selected: Option<String>,
    pub category_name_selected: Option<String>,
    pub selection_source: SelectionSource,
    pub kind: TransactionType,
    pub amount_minor: i64,
    pub currency: Currency,
    pub occurred_at: Option<DateTime<Utc>>,
    /// Category ids in keyboard order.
    pub category_list: Vec<String>,
    pub category_list_message_id: Option<i32>,
    pub confirmation_message_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "operation_contexts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub op_id: String,
    pub telegram_id: i64,
    pub tenant_id: String,
    pub draft_id: Option<String>,
    pub transaction_id: Option<String>,
    pub description_original: String,
    pub category_id_selected: Option<String>,
    pub category_name_selected: Option<String>,
    pub selection_source: String,
    pub tx_type: String,
    pub amount_minor: i64,
    pub currency: String,
    pub occurred_at: Option<DateTimeUtc>,
    pub category_list: String,
    pub category_list_message_id: Option<i32>,
    pub confirmation_message_id: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for OperationContext {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let category_list =
            serde_json::from_str(&model.category_list).map_err(|err| StoreError::Corrupted {
                column: "operation_contexts.category_list",
                reason: err.to_string(),
            })?;
        Ok(Self {
            selection_source: SelectionSource::try_from(model.selection_source.as_str())?,
            kind: TransactionType::try_from(model.tx_type.as_str()).map_err(|reason| {
                StoreError::Corrupted {
                    column: "operation_contexts.tx_type",
                    reason,
                }
            })?,
            currency: Currency::try_from(model.currency.as_str()).map_err(|err| {
                StoreError::Corrupted {
                    column: "operation_contexts.currency",
                    reason: err.to_string(),
                }
            })?,
            category_list,
            op_id: model.op_id,
            telegram_id: model.telegram_id,
            tenant_id: model.tenant_id,
            draft_id: model.draft_id,
            transaction_id: model.transaction_id,
            description_original: model.description_original,
            category_id_selected: model.category_id_selected,
            category_name_selected: model.category_name_selected,
            amount_minor: model.amount_minor,
            occurred_at: model.occurred_at,
            category_list_message_id: model.category_list_message_id,
            confirmation_message_id: model.confirmation_message_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
