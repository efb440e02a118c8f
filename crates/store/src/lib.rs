//! Typed persistence for the chat front-end.
//!
//! Every method is its own unit of work. Writes keyed by `telegram_id`
//! (sessions, dialog states, preferences) are upserts, so the last writer
//! wins when two updates for the same user race.

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseConnection, QueryFilter, QueryOrder,
    prelude::*,
    sea_query::{Expr, OnConflict},
};

pub use api_types::{Currency, TransactionType};
pub use category_mappings::{CategoryMapping, normalize_keyword};
pub use dialog_states::{ContextValue, DialogContext, DialogState, DialogStateRecord};
pub use drafts::TransactionDraft;
pub use error::StoreError;
pub use operation_contexts::{OperationContext, SelectionSource};
pub use preferences::UserPreferences;
pub use sessions::UserSession;

mod category_mappings;
mod dialog_states;
mod drafts;
mod error;
mod operation_contexts;
mod preferences;
mod sessions;

type ResultStore<T> = Result<T, StoreError>;

#[derive(Clone, Debug)]
pub struct Store {
    database: DatabaseConnection,
}

impl Store {
    /// Return a builder for `Store`.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    // Sessions

    /// Inserts or replaces the session of `session.telegram_id`.
    pub async fn save_session(&self, session: &UserSession) -> ResultStore<()> {
        if session.access_token.is_empty() || session.refresh_token.is_empty() {
            return Err(StoreError::Invalid(
                "session tokens must not be empty".to_string(),
            ));
        }

        let model = sessions::ActiveModel {
            telegram_id: ActiveValue::Set(session.telegram_id),
            user_id: ActiveValue::Set(session.user_id.clone()),
            tenant_id: ActiveValue::Set(session.tenant_id.clone()),
            access_token: ActiveValue::Set(session.access_token.clone()),
            refresh_token: ActiveValue::Set(session.refresh_token.clone()),
            access_expires_at: ActiveValue::Set(session.access_expires_at),
            refresh_expires_at: ActiveValue::Set(session.refresh_expires_at),
            created_at: ActiveValue::Set(session.created_at),
            updated_at: ActiveValue::Set(Utc::now()),
        };

        sessions::Entity::insert(model)
            .on_conflict(
                OnConflict::column(sessions::Column::TelegramId)
                    .update_columns([
                        sessions::Column::UserId,
                        sessions::Column::TenantId,
                        sessions::Column::AccessToken,
                        sessions::Column::RefreshToken,
                        sessions::Column::AccessExpiresAt,
                        sessions::Column::RefreshExpiresAt,
                        sessions::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.database)
            .await?;
        Ok(())
    }

    pub async fn session(&self, telegram_id: i64) -> ResultStore<Option<UserSession>> {
        let model = sessions::Entity::find_by_id(telegram_id)
            .one(&self.database)
            .await?;
        Ok(model.map(UserSession::from))
    }

    /// Deletes the session. Deleting a missing session is not an error.
    pub async fn delete_session(&self, telegram_id: i64) -> ResultStore<()> {
        sessions::Entity::delete_by_id(telegram_id)
            .exec(&self.database)
            .await?;
        Ok(())
    }

    /// Updates only the tenant of an existing session.
    pub async fn update_session_tenant(&self, telegram_id: i64, tenant_id: &str) -> ResultStore<()> {
        let res = sessions::Entity::update_many()
            .col_expr(sessions::Column::TenantId, Expr::value(tenant_id.to_string()))
            .col_expr(sessions::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sessions::Column::TelegramId.eq(telegram_id))
            .exec(&self.database)
            .await?;
        if res.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("session {telegram_id}")));
        }
        Ok(())
    }

    // Dialog states

    /// Stores the dialog state of a user. `Idle` removes the row.
    pub async fn set_state(
        &self,
        telegram_id: i64,
        state: DialogState,
        draft_id: Option<&str>,
        context: &DialogContext,
    ) -> ResultStore<()> {
        if state == DialogState::Idle {
            return self.clear_state(telegram_id).await;
        }
        if draft_id.is_some() && !state.holds_draft() {
            return Err(StoreError::Invalid(format!(
                "state {state} cannot reference a draft"
            )));
        }

        let context = serde_json::to_string(context)
            .map_err(|err| StoreError::Invalid(format!("dialog context: {err}")))?;
        let model = dialog_states::ActiveModel {
            telegram_id: ActiveValue::Set(telegram_id),
            state: ActiveValue::Set(state.as_str().to_string()),
            draft_id: ActiveValue::Set(draft_id.map(ToString::to_string)),
            context: ActiveValue::Set(context),
            updated_at: ActiveValue::Set(Utc::now()),
        };

        dialog_states::Entity::insert(model)
            .on_conflict(
                OnConflict::column(dialog_states::Column::TelegramId)
                    .update_columns([
                        dialog_states::Column::State,
                        dialog_states::Column::DraftId,
                        dialog_states::Column::Context,
                        dialog_states::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.database)
            .await?;
        Ok(())
    }

    pub async fn state(&self, telegram_id: i64) -> ResultStore<Option<DialogStateRecord>> {
        dialog_states::Entity::find_by_id(telegram_id)
            .one(&self.database)
            .await?
            .map(DialogStateRecord::try_from)
            .transpose()
    }

    pub async fn clear_state(&self, telegram_id: i64) -> ResultStore<()> {
        dialog_states::Entity::delete_by_id(telegram_id)
            .exec(&self.database)
            .await?;
        Ok(())
    }

    // Category mappings

    /// Adds a mapping, or retargets the existing one for the same keyword.
    pub async fn add_mapping(
        &self,
        tenant_id: &str,
        keyword: &str,
        category_id: &str,
        priority: i32,
    ) -> ResultStore<CategoryMapping> {
        let keyword = normalize_keyword(keyword);
        if keyword.is_empty() || category_id.trim().is_empty() {
            return Err(StoreError::Invalid(
                "mapping keyword and category must not be empty".to_string(),
            ));
        }

        let model = category_mappings::ActiveModel {
            id: ActiveValue::NotSet,
            tenant_id: ActiveValue::Set(tenant_id.to_string()),
            keyword: ActiveValue::Set(keyword.clone()),
            category_id: ActiveValue::Set(category_id.trim().to_string()),
            priority: ActiveValue::Set(priority),
            created_at: ActiveValue::Set(Utc::now()),
        };

        category_mappings::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    category_mappings::Column::TenantId,
                    category_mappings::Column::Keyword,
                ])
                .update_columns([
                    category_mappings::Column::CategoryId,
                    category_mappings::Column::Priority,
                ])
                .to_owned(),
            )
            .exec(&self.database)
            .await?;

        self.find_mapping(tenant_id, &keyword)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("mapping {keyword}")))
    }

    pub async fn find_mapping(
        &self,
        tenant_id: &str,
        keyword: &str,
    ) -> ResultStore<Option<CategoryMapping>> {
        let model = category_mappings::Entity::find()
            .filter(category_mappings::Column::TenantId.eq(tenant_id))
            .filter(category_mappings::Column::Keyword.eq(normalize_keyword(keyword)))
            .one(&self.database)
            .await?;
        Ok(model.map(CategoryMapping::from))
    }

    /// All mappings of a tenant in insertion order.
    pub async fn list_mappings(&self, tenant_id: &str) -> ResultStore<Vec<CategoryMapping>> {
        let models = category_mappings::Entity::find()
            .filter(category_mappings::Column::TenantId.eq(tenant_id))
            .order_by_asc(category_mappings::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(CategoryMapping::from).collect())
    }

    /// Returns whether a mapping was removed.
    pub async fn remove_mapping(&self, tenant_id: &str, keyword: &str) -> ResultStore<bool> {
        let res = category_mappings::Entity::delete_many()
            .filter(category_mappings::Column::TenantId.eq(tenant_id))
            .filter(category_mappings::Column::Keyword.eq(normalize_keyword(keyword)))
            .exec(&self.database)
            .await?;
        Ok(res.rows_affected > 0)
    }

    // Preferences

    pub async fn preferences(&self, telegram_id: i64) -> ResultStore<Option<UserPreferences>> {
        let model = preferences::Entity::find_by_id(telegram_id)
            .one(&self.database)
            .await?;
        Ok(model.map(UserPreferences::from))
    }

    pub async fn save_preferences(&self, prefs: &UserPreferences) -> ResultStore<()> {
        let model = preferences::ActiveModel {
            telegram_id: ActiveValue::Set(prefs.telegram_id),
            language: ActiveValue::Set(prefs.language.clone()),
            default_currency: ActiveValue::Set(
                prefs
                    .default_currency
                    .map(|c| c.code().to_string())
                    .unwrap_or_default(),
            ),
            updated_at: ActiveValue::Set(Utc::now()),
        };

        preferences::Entity::insert(model)
            .on_conflict(
                OnConflict::column(preferences::Column::TelegramId)
                    .update_columns([
                        preferences::Column::Language,
                        preferences::Column::DefaultCurrency,
                        preferences::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.database)
            .await?;
        Ok(())
    }

    // Drafts

    pub async fn create_draft(&self, draft: &TransactionDraft) -> ResultStore<()> {
        if draft.id.is_empty() {
            return Err(StoreError::Invalid("draft id must not be empty".to_string()));
        }
        let model = drafts::ActiveModel {
            id: ActiveValue::Set(draft.id.clone()),
            telegram_id: ActiveValue::Set(draft.telegram_id),
            tx_type: ActiveValue::Set(draft.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(draft.amount_minor),
            currency: ActiveValue::Set(draft.currency.code().to_string()),
            description: ActiveValue::Set(draft.description.clone()),
            category_id: ActiveValue::Set(draft.category_id.clone()),
            occurred_at: ActiveValue::Set(draft.occurred_at),
            created_at: ActiveValue::Set(draft.created_at),
        };
        drafts::Entity::insert(model).exec(&self.database).await?;
        Ok(())
    }

    pub async fn draft(&self, id: &str) -> ResultStore<Option<TransactionDraft>> {
        drafts::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .map(TransactionDraft::try_from)
            .transpose()
    }

    pub async fn delete_draft(&self, id: &str) -> ResultStore<()> {
        drafts::Entity::delete_by_id(id.to_string())
            .exec(&self.database)
            .await?;
        Ok(())
    }

    // Operation contexts

    pub async fn save_operation(&self, op: &OperationContext) -> ResultStore<()> {
        let category_list = serde_json::to_string(&op.category_list)
            .map_err(|err| StoreError::Invalid(format!("category list: {err}")))?;
        let model = operation_contexts::ActiveModel {
            op_id: ActiveValue::Set(op.op_id.clone()),
            telegram_id: ActiveValue::Set(op.telegram_id),
            tenant_id: ActiveValue::Set(op.tenant_id.clone()),
            draft_id: ActiveValue::Set(op.draft_id.clone()),
            transaction_id: ActiveValue::Set(op.transaction_id.clone()),
            description_original: ActiveValue::Set(op.description_original.clone()),
            category_id_selected: ActiveValue::Set(op.category_id_selected.clone()),
            category_name_selected: ActiveValue::Set(op.category_name_selected.clone()),
            selection_source: ActiveValue::Set(op.selection_source.as_str().to_string()),
            tx_type: ActiveValue::Set(op.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(op.amount_minor),
            currency: ActiveValue::Set(op.currency.code().to_string()),
            occurred_at: ActiveValue::Set(op.occurred_at),
            category_list: ActiveValue::Set(category_list),
            category_list_message_id: ActiveValue::Set(op.category_list_message_id),
            confirmation_message_id: ActiveValue::Set(op.confirmation_message_id),
            created_at: ActiveValue::Set(op.created_at),
            updated_at: ActiveValue::Set(Utc::now()),
        };

        operation_contexts::Entity::insert(model)
            .on_conflict(
                OnConflict::column(operation_contexts::Column::OpId)
                    .update_columns([
                        operation_contexts::Column::DraftId,
                        operation_contexts::Column::TransactionId,
                        operation_contexts::Column::CategoryIdSelected,
                        operation_contexts::Column::CategoryNameSelected,
                        operation_contexts::Column::SelectionSource,
                        operation_contexts::Column::CategoryList,
                        operation_contexts::Column::CategoryListMessageId,
                        operation_contexts::Column::ConfirmationMessageId,
                        operation_contexts::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.database)
            .await?;
        Ok(())
    }

    pub async fn operation(&self, op_id: &str) -> ResultStore<Option<OperationContext>> {
        operation_contexts::Entity::find_by_id(op_id.to_string())
            .one(&self.database)
            .await?
            .map(OperationContext::try_from)
            .transpose()
    }

    pub async fn delete_operation(&self, op_id: &str) -> ResultStore<()> {
        operation_contexts::Entity::delete_by_id(op_id.to_string())
            .exec(&self.database)
            .await?;
        Ok(())
    }
}

/// The builder for `Store`
#[derive(Default)]
pub struct StoreBuilder {
    database: Option<DatabaseConnection>,
}

impl StoreBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> StoreBuilder {
        self.database = Some(db);
        self
    }

    /// Construct `Store`
    pub fn build(self) -> ResultStore<Store> {
        let database = self
            .database
            .ok_or_else(|| StoreError::Invalid("missing database connection".to_string()))?;
        tracing::debug!("store ready");
        Ok(Store { database })
    }
}
