//! Per-user dialog state.
//!
//! A missing row means the user is idle. The context is a flat map of
//! primitives stored as JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::StoreError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DialogState {
    #[default]
    Idle,
    WaitingForOauthEmail,
    WaitingForOauthCode,
    WaitingForRegisterEmail,
    WaitingForRegisterPassword,
    WaitingForRegisterName,
    WaitingForCategory,
    ConfirmingTransaction,
}

impl DialogState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DialogState::Idle => "idle",
            DialogState::WaitingForOauthEmail => "waiting_for_oauth_email",
            DialogState::WaitingForOauthCode => "waiting_for_oauth_code",
            DialogState::WaitingForRegisterEmail => "waiting_for_register_email",
            DialogState::WaitingForRegisterPassword => "waiting_for_register_password",
            DialogState::WaitingForRegisterName => "waiting_for_register_name",
            DialogState::WaitingForCategory => "waiting_for_category",
            DialogState::ConfirmingTransaction => "confirming_transaction",
        }
    }

    /// States that may reference a transaction draft.
    #[must_use]
    pub const fn holds_draft(self) -> bool {
        matches!(
            self,
            DialogState::WaitingForCategory | DialogState::ConfirmingTransaction
        )
    }
}

impl core::fmt::Display for DialogState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DialogState {
    type Error = StoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "idle" => Ok(DialogState::Idle),
            "waiting_for_oauth_email" => Ok(DialogState::WaitingForOauthEmail),
            "waiting_for_oauth_code" => Ok(DialogState::WaitingForOauthCode),
            "waiting_for_register_email" => Ok(DialogState::WaitingForRegisterEmail),
            "waiting_for_register_password" => Ok(DialogState::WaitingForRegisterPassword),
            "waiting_for_register_name" => Ok(DialogState::WaitingForRegisterName),
            "waiting_for_category" => Ok(DialogState::WaitingForCategory),
            "confirming_transaction" => Ok(DialogState::ConfirmingTransaction),
            other => Err(StoreError::Corrupted {
                column: "dialog_states.state",
                reason: format!("unknown state {other}"),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Typed key/value bag carried across dialog turns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogContext(BTreeMap<String, ContextValue>);

impl DialogContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ContextValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ContextValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(ContextValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DialogStateRecord {
    pub telegram_id: i64,
    pub state: DialogState,
    pub draft_id: Option<String>,
    pub context: DialogContext,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "dialog_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub telegram_id: i64,
    pub state: String,
    pub draft_id: Option<String>,
    pub context: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for DialogStateRecord {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let context =
            serde_json::from_str(&model.context).map_err(|err| StoreError::Corrupted {
                column: "dialog_states.context",
                reason: err.to_string(),
            })?;
        Ok(Self {
            telegram_id: model.telegram_id,
            state: DialogState::try_from(model.state.as_str())?,
            draft_id: model.draft_id,
            context,
            updated_at: model.updated_at,
        })
    }
}
