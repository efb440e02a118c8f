use api_types::{Currency, transaction::TransactionNew};
use chrono::Utc;
use store::{
    DialogContext, DialogState, OperationContext, SelectionSource, TransactionDraft, UserSession,
};
use uuid::Uuid;

use super::Dispatcher;
use crate::{
    commands::CategoryRef,
    error::{BotError, ErrorKind},
    metrics,
    parsing::ParsedTransaction,
    resolver::head_token,
    ui,
};

const NO_DRAFT: &str = "Нет транзакции, ожидающей выбора. Отправьте сумму и описание, например «450 такси».";

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl Dispatcher {
    async fn default_currency(&self, telegram_id: i64) -> Result<Currency, BotError> {
        Ok(self
            .store
            .preferences(telegram_id)
            .await?
            .and_then(|p| p.default_currency)
            .unwrap_or_default())
    }

    pub(super) async fn free_text(
        &self,
        telegram_id: i64,
        chat_id: i64,
        text: &str,
    ) -> Result<(), BotError> {
        let parsed = self.parser.parse(text);
        if !parsed.is_valid() {
            let errors = parsed
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            self.send(
                chat_id,
                &format!("Не удалось распознать ({errors}). Пример: «вчера 450 такси»."),
            )
            .await;
            return Ok(());
        }
        let currency = match parsed.currency {
            Some(currency) => currency,
            None => self.default_currency(telegram_id).await?,
        };

        let session = match self.session(telegram_id).await {
            Ok(session) => session,
            Err(err) if err.kind() == ErrorKind::Unauthenticated => {
                self.send(
                    chat_id,
                    &format!(
                        "{}\nЧтобы сохранять транзакции, войдите: /login",
                        ui::recognized_text(
                            parsed.kind,
                            parsed.amount_minor,
                            currency,
                            &parsed.description
                        )
                    ),
                )
                .await;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let resolution = self
            .resolver
            .resolve(
                &session.access_token,
                &session.tenant_id,
                telegram_id,
                parsed.kind,
                &parsed.description,
            )
            .await?;

        let now = Utc::now();
        let draft = TransactionDraft {
            id: new_id(),
            telegram_id,
            kind: parsed.kind,
            amount_minor: parsed.amount_minor,
            currency,
            description: parsed.description.clone(),
            category_id: resolution
                .matched
                .as_ref()
                .map(|m| m.category_id.clone())
                .or_else(|| resolution.suggestion.as_ref().map(|s| s.category_id.clone())),
            occurred_at: parsed.occurred_at,
            created_at: now,
        };
        self.store.create_draft(&draft).await?;

        let mut op = operation(&session, &draft, &parsed);
        op.category_list = resolution.candidates.iter().map(|c| c.id.clone()).collect();

        if let Some(mapping) = resolution.matched {
            let result = self.commit(&session, &draft, &mapping.category_id).await;
            self.discard_draft(telegram_id, &draft.id).await;
            let transaction_id = result?;

            op.draft_id = None;
            op.transaction_id = Some(transaction_id);
            op.category_id_selected = Some(mapping.category_id.clone());
            op.selection_source = SelectionSource::Keyword;
            self.record_operation(&op).await;

            self.send(
                chat_id,
                &ui::saved_text(
                    draft.kind,
                    draft.amount_minor,
                    draft.currency,
                    &draft.description,
                    &mapping.category_id,
                ),
            )
            .await;
            return Ok(());
        }

        if let Some(suggestion) = resolution.suggestion {
            let name = resolution
                .candidates
                .iter()
                .find(|c| c.id == suggestion.category_id)
                .map_or_else(|| suggestion.category_id.clone(), ui::category_label);
            op.category_id_selected = Some(suggestion.category_id.clone());
            op.category_name_selected = Some(name.clone());
            op.selection_source = SelectionSource::Llm;
            self.store.save_operation(&op).await?;
            self.store
                .set_state(
                    telegram_id,
                    DialogState::ConfirmingTransaction,
                    Some(&draft.id),
                    &DialogContext::new().with("op_id", op.op_id.as_str()),
                )
                .await?;

            let mut text = format!(
                "{}\nКатегория: {name}",
                ui::recognized_text(draft.kind, draft.amount_minor, draft.currency, &draft.description)
            );
            if !suggestion.reason.is_empty() {
                text.push_str(&format!(" ({})", suggestion.reason));
            }
            text.push_str("\nСохранить?");
            op.confirmation_message_id = self
                .send_inline(chat_id, &text, ui::confirm_keyboard())
                .await;
            self.store.save_operation(&op).await?;
            return Ok(());
        }

        if resolution.candidates.is_empty() {
            self.store.delete_draft(&draft.id).await?;
            return Err(BotError::InvalidArgument(
                "Нет доступных категорий. Создайте категорию: /create_category <код> <название>"
                    .to_string(),
            ));
        }

        self.store.save_operation(&op).await?;
        self.store
            .set_state(
                telegram_id,
                DialogState::WaitingForCategory,
                Some(&draft.id),
                &DialogContext::new().with("op_id", op.op_id.as_str()),
            )
            .await?;
        op.category_list_message_id = self
            .send_inline(
                chat_id,
                &format!(
                    "{}\nВыберите категорию:",
                    ui::recognized_text(draft.kind, draft.amount_minor, draft.currency, &draft.description)
                ),
                ui::category_keyboard(&resolution.candidates, &op.op_id),
            )
            .await;
        self.store.save_operation(&op).await?;
        Ok(())
    }

    /// Creates the remote transaction and counts the attempt.
    async fn commit(
        &self,
        session: &UserSession,
        draft: &TransactionDraft,
        category_id: &str,
    ) -> Result<String, BotError> {
        let result = self
            .finance
            .create_transaction(
                &session.access_token,
                &TransactionNew {
                    tenant_id: session.tenant_id.clone(),
                    kind: draft.kind,
                    amount_minor: draft.amount_minor,
                    currency: draft.currency.code().to_string(),
                    description: draft.description.clone(),
                    category_id: category_id.to_string(),
                    occurred_at: draft.occurred_at.unwrap_or_else(Utc::now),
                },
            )
            .await;
        metrics::record_transaction_saved(result.is_ok());
        let created = result?;
        tracing::info!(
            telegram_id = draft.telegram_id,
            transaction_id = %created.id,
            "Transaction saved"
        );
        Ok(created.id)
    }

    /// Drops the draft and leaves its dialog state once the transaction exists
    /// remotely. Store failures are only logged from here on.
    async fn finish_draft(&self, telegram_id: i64, draft_id: &str) {
        if let Err(err) = self.store.clear_state(telegram_id).await {
            tracing::warn!(telegram_id, "Failed to clear dialog state: {err}");
        }
        self.discard_draft(telegram_id, draft_id).await;
    }

    async fn discard_draft(&self, telegram_id: i64, draft_id: &str) {
        if let Err(err) = self.store.delete_draft(draft_id).await {
            tracing::warn!(telegram_id, draft_id, "Failed to delete draft: {err}");
        }
    }

    async fn record_operation(&self, op: &OperationContext) {
        if let Err(err) = self.store.save_operation(op).await {
            tracing::warn!(op_id = %op.op_id, "Failed to save operation context: {err}");
        }
    }

    async fn learn_keyword(
        &self,
        telegram_id: i64,
        tenant_id: &str,
        keyword: &str,
        category_id: &str,
    ) {
        let learned = match self.store.find_mapping(tenant_id, keyword).await {
            Ok(Some(_)) => return,
            Ok(None) => self.store.add_mapping(tenant_id, keyword, category_id, 0).await,
            Err(err) => Err(err),
        };
        match learned {
            Ok(_) => tracing::debug!(
                telegram_id,
                keyword = %keyword,
                category_id = %category_id,
                "Learned keyword mapping"
            ),
            Err(err) => {
                tracing::warn!(telegram_id, keyword = %keyword, "Failed to learn keyword: {err}")
            }
        }
    }

    pub(super) async fn category_picked(
        &self,
        telegram_id: i64,
        chat_id: i64,
        message_id: Option<i32>,
        category: CategoryRef,
    ) -> Result<(), BotError> {
        let record = match self.store.state(telegram_id).await? {
            Some(record) if record.state == DialogState::WaitingForCategory => record,
            _ => {
                self.send(chat_id, NO_DRAFT).await;
                return Ok(());
            }
        };
        let Some(draft_id) = record.draft_id.as_deref() else {
            self.store.clear_state(telegram_id).await?;
            self.send(chat_id, NO_DRAFT).await;
            return Ok(());
        };
        let Some(draft) = self.store.draft(draft_id).await? else {
            self.store.clear_state(telegram_id).await?;
            self.send(chat_id, NO_DRAFT).await;
            return Ok(());
        };
        let mut op = match record.context.text("op_id") {
            Some(op_id) => self.store.operation(op_id).await?,
            None => None,
        };

        let category_id = match category {
            CategoryRef::Id(id) => id,
            CategoryRef::Indexed { op_id, index } => self
                .store
                .operation(&op_id)
                .await?
                .and_then(|op| op.category_list.get(index).cloned())
                .ok_or_else(|| BotError::Store(store::StoreError::NotFound(op_id)))?,
        };

        let session = self.session(telegram_id).await?;
        let categories = self
            .resolver
            .categories(&session.access_token, &session.tenant_id, telegram_id, None)
            .await?;
        let name = categories
            .iter()
            .find(|c| c.id == category_id)
            .map_or_else(|| category_id.clone(), ui::category_label);

        let transaction_id = self.commit(&session, &draft, &category_id).await?;
        self.finish_draft(telegram_id, &draft.id).await;

        if let Some(keyword) = head_token(&draft.description) {
            self.learn_keyword(telegram_id, &session.tenant_id, &keyword, &category_id)
                .await;
        }

        if let Some(op) = op.as_mut() {
            op.draft_id = None;
            op.transaction_id = Some(transaction_id);
            op.category_id_selected = Some(category_id.clone());
            op.category_name_selected = Some(name.clone());
            op.selection_source = SelectionSource::Manual;
            self.record_operation(op).await;
        }

        let text = ui::saved_text(
            draft.kind,
            draft.amount_minor,
            draft.currency,
            &draft.description,
            &name,
        );
        let target = message_id.or(op.and_then(|op| op.category_list_message_id));
        self.edit_or_send(chat_id, target, &text, None).await;
        Ok(())
    }

    pub(super) async fn confirm(
        &self,
        telegram_id: i64,
        chat_id: i64,
        message_id: Option<i32>,
        yes: bool,
    ) -> Result<(), BotError> {
        let record = match self.store.state(telegram_id).await? {
            Some(record) if record.state == DialogState::ConfirmingTransaction => record,
            _ => {
                self.send(chat_id, "Нет транзакции для подтверждения.").await;
                return Ok(());
            }
        };
        let draft = match record.draft_id.as_deref() {
            Some(id) => self.store.draft(id).await?,
            None => None,
        };
        let op_id = record.context.text("op_id").map(ToString::to_string);

        let Some(draft) = draft else {
            self.store.clear_state(telegram_id).await?;
            self.send(chat_id, "Черновик не найден, отправьте транзакцию заново.")
                .await;
            return Ok(());
        };

        if !yes {
            self.store.delete_draft(&draft.id).await?;
            if let Some(op_id) = &op_id {
                self.store.delete_operation(op_id).await?;
            }
            self.store.clear_state(telegram_id).await?;
            self.edit_or_send(chat_id, message_id, "Транзакция отменена.", None)
                .await;
            return Ok(());
        }

        let Some(category_id) = draft.category_id.clone() else {
            return Err(BotError::InvalidArgument(
                "У черновика нет категории, отмените: /cancel".to_string(),
            ));
        };
        let session = self.session(telegram_id).await?;
        let transaction_id = self.commit(&session, &draft, &category_id).await?;
        self.finish_draft(telegram_id, &draft.id).await;

        let mut name = category_id.clone();
        let op = match &op_id {
            Some(op_id) => self.store.operation(op_id).await.unwrap_or_else(|err| {
                tracing::warn!(telegram_id, "Failed to load operation {op_id}: {err}");
                None
            }),
            None => None,
        };
        if let Some(mut op) = op {
            if let Some(selected) = &op.category_name_selected {
                name = selected.clone();
            }
            op.draft_id = None;
            op.transaction_id = Some(transaction_id);
            self.record_operation(&op).await;
        }

        self.edit_or_send(
            chat_id,
            message_id,
            &ui::saved_text(
                draft.kind,
                draft.amount_minor,
                draft.currency,
                &draft.description,
                &name,
            ),
            None,
        )
        .await;
        Ok(())
    }
}

fn operation(
    session: &UserSession,
    draft: &TransactionDraft,
    parsed: &ParsedTransaction,
) -> OperationContext {
    OperationContext {
        op_id: new_id(),
        telegram_id: draft.telegram_id,
        tenant_id: session.tenant_id.clone(),
        draft_id: Some(draft.id.clone()),
        transaction_id: None,
        description_original: parsed.description.clone(),
        category_id_selected: None,
        category_name_selected: None,
        selection_source: SelectionSource::Manual,
        kind: draft.kind,
        amount_minor: draft.amount_minor,
        currency: draft.currency,
        occurred_at: draft.occurred_at,
        category_list: Vec::new(),
        category_list_message_id: None,
        confirmation_message_id: None,
        created_at: draft.created_at,
        updated_at: draft.created_at,
    }
}
