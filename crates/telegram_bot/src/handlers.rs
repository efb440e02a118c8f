//! Update routing and the dialog state machine.
//!
//! An update goes to the callback branch, the command branch, the handler
//! of the user's pending dialog state, or the transaction parser, in that
//! order. Handlers return [`BotError`]; [`Dispatcher::handle`] is the only
//! place where an error becomes user-facing text.

use std::sync::Arc;

use chrono::{NaiveDate, Offset, Utc};
use chrono_tz::Tz;
use store::{DialogState, Store, UserSession};
use teloxide::types::InlineKeyboardMarkup;

use crate::{
    api::FinanceApi,
    commands::{Callback, Command, parse_callback, parse_command},
    error::{BotError, ErrorKind},
    fx::FxConverter,
    metrics,
    parsing::Parser,
    resolver::CategoryResolver,
    session::SessionManager,
    transport::{Keyboard, Transport},
};

mod auth;
mod categories;
mod help;
mod reports;
mod settings;
mod transactions;

/// A chat update reduced to what the handlers use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Incoming {
    Message {
        telegram_id: i64,
        chat_id: i64,
        text: String,
    },
    Callback {
        telegram_id: i64,
        chat_id: i64,
        callback_id: String,
        /// Message the pressed keyboard belongs to.
        message_id: Option<i32>,
        data: String,
    },
}

pub(crate) struct Dispatcher {
    store: Store,
    sessions: SessionManager,
    finance: Arc<dyn FinanceApi>,
    resolver: CategoryResolver,
    fx: FxConverter,
    parser: Parser,
    transport: Arc<dyn Transport>,
    timezone: Tz,
}

pub(crate) struct DispatcherParts {
    pub(crate) store: Store,
    pub(crate) sessions: SessionManager,
    pub(crate) finance: Arc<dyn FinanceApi>,
    pub(crate) resolver: CategoryResolver,
    pub(crate) fx: FxConverter,
    pub(crate) parser: Parser,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) timezone: Tz,
}

impl Dispatcher {
    pub(crate) fn new(parts: DispatcherParts) -> Self {
        Self {
            store: parts.store,
            sessions: parts.sessions,
            finance: parts.finance,
            resolver: parts.resolver,
            fx: parts.fx,
            parser: parts.parser,
            transport: parts.transport,
            timezone: parts.timezone,
        }
    }

    pub(crate) async fn handle(&self, update: Incoming) {
        let (telegram_id, chat_id) = match &update {
            Incoming::Message {
                telegram_id,
                chat_id,
                ..
            }
            | Incoming::Callback {
                telegram_id,
                chat_id,
                ..
            } => (*telegram_id, *chat_id),
        };

        let result = match update {
            Incoming::Callback {
                callback_id,
                message_id,
                data,
                ..
            } => {
                if let Err(err) = self.transport.answer_callback(&callback_id).await {
                    tracing::warn!(telegram_id, "Failed to answer callback: {err}");
                }
                self.callback(telegram_id, chat_id, message_id, &data).await
            }
            Incoming::Message { text, .. } => {
                metrics::record_update();
                self.message(telegram_id, chat_id, &text).await
            }
        };

        if let Err(err) = result {
            match err.kind() {
                ErrorKind::Internal => tracing::error!(telegram_id, "Update failed: {err}"),
                _ => tracing::info!(telegram_id, "Update rejected: {err}"),
            }
            self.send(chat_id, &user_message_for_error(&err)).await;
        }
    }

    async fn message(&self, telegram_id: i64, chat_id: i64, text: &str) -> Result<(), BotError> {
        if let Some(command) = parse_command(text) {
            return self.command(telegram_id, chat_id, command).await;
        }
        if let Some(record) = self.store.state(telegram_id).await? {
            return self.state_input(telegram_id, chat_id, record, text).await;
        }
        self.free_text(telegram_id, chat_id, text).await
    }

    async fn command(
        &self,
        telegram_id: i64,
        chat_id: i64,
        command: Command,
    ) -> Result<(), BotError> {
        tracing::debug!(telegram_id, "Command {command:?}");
        match command {
            Command::Start => self.start(chat_id).await,
            Command::Help(section) => self.help(chat_id, &section).await,
            Command::Cancel => self.cancel(telegram_id, chat_id).await,
            Command::Login => self.login(telegram_id, chat_id).await,
            Command::Register => self.register(telegram_id, chat_id).await,
            Command::Logout => self.logout(telegram_id, chat_id).await,
            Command::SwitchTenant => self.switch_tenant(telegram_id, chat_id).await,
            Command::Categories => self.categories(telegram_id, chat_id).await,
            Command::CreateCategory(args) => {
                self.create_category(telegram_id, chat_id, &args).await
            }
            Command::RenameCategory(args) => {
                self.rename_category(telegram_id, chat_id, &args).await
            }
            Command::DeleteCategory(args) => {
                self.delete_category(telegram_id, chat_id, &args).await
            }
            Command::Map(args) => self.map(telegram_id, chat_id, &args).await,
            Command::Unmap(args) => self.unmap(telegram_id, chat_id, &args).await,
            Command::Stats(args) => self.stats(telegram_id, chat_id, &args).await,
            Command::TopCategories(args) => {
                self.top_categories(telegram_id, chat_id, &args).await
            }
            Command::Recent(args) => self.recent(telegram_id, chat_id, &args).await,
            Command::Export(args) => self.export(telegram_id, chat_id, &args).await,
            Command::Language => self.language(chat_id).await,
            Command::Currency => self.currency(chat_id).await,
            Command::Profile => self.profile(telegram_id, chat_id).await,
            Command::Unknown(name) => {
                tracing::debug!(telegram_id, "Unknown command /{name}");
                self.send(chat_id, "Неизвестная команда. Список команд: /help")
                    .await;
                Ok(())
            }
        }
    }

    async fn state_input(
        &self,
        telegram_id: i64,
        chat_id: i64,
        record: store::DialogStateRecord,
        text: &str,
    ) -> Result<(), BotError> {
        match record.state {
            DialogState::Idle => self.free_text(telegram_id, chat_id, text).await,
            DialogState::WaitingForOauthEmail => {
                self.oauth_email(telegram_id, chat_id, text).await
            }
            DialogState::WaitingForOauthCode => {
                self.oauth_code(telegram_id, chat_id, &record.context, text)
                    .await
            }
            DialogState::WaitingForRegisterEmail => {
                self.register_email(telegram_id, chat_id, text).await
            }
            DialogState::WaitingForRegisterPassword => {
                self.register_password(telegram_id, chat_id, &record.context, text)
                    .await
            }
            DialogState::WaitingForRegisterName => {
                self.register_name(telegram_id, chat_id, &record.context, text)
                    .await
            }
            DialogState::WaitingForCategory => {
                self.send(
                    chat_id,
                    "Выберите категорию кнопкой выше или отмените: /cancel",
                )
                .await;
                Ok(())
            }
            DialogState::ConfirmingTransaction => {
                self.send(chat_id, "Подтвердите транзакцию кнопками выше или отмените: /cancel")
                    .await;
                Ok(())
            }
        }
    }

    async fn callback(
        &self,
        telegram_id: i64,
        chat_id: i64,
        message_id: Option<i32>,
        data: &str,
    ) -> Result<(), BotError> {
        match parse_callback(data) {
            Callback::Category(category) => {
                self.category_picked(telegram_id, chat_id, message_id, category)
                    .await
            }
            Callback::Confirm(yes) => self.confirm(telegram_id, chat_id, message_id, yes).await,
            Callback::Lang(code) => self.set_language(telegram_id, chat_id, message_id, &code).await,
            Callback::Cur(code) => self.set_currency(telegram_id, chat_id, message_id, &code).await,
            Callback::Tenant(tenant_id) => {
                self.tenant_picked(telegram_id, chat_id, message_id, &tenant_id)
                    .await
            }
            Callback::Help(section) => self.help_page(chat_id, message_id, &section).await,
            Callback::Unknown => {
                tracing::debug!(telegram_id, "Ignoring callback {data}");
                Ok(())
            }
        }
    }

    /// Drops whatever the user was doing: pending login, draft, operation.
    async fn cancel(&self, telegram_id: i64, chat_id: i64) -> Result<(), BotError> {
        if let Some(record) = self.store.state(telegram_id).await? {
            if record.state == DialogState::WaitingForOauthCode
                && let Some(auth_token) = record.context.text("auth_token")
            {
                self.sessions.cancel_auth(telegram_id, auth_token).await;
            }
            if let Some(draft_id) = &record.draft_id {
                self.store.delete_draft(draft_id).await?;
            }
            if let Some(op_id) = record.context.text("op_id") {
                self.store.delete_operation(op_id).await?;
            }
            self.store.clear_state(telegram_id).await?;
        }
        self.send(chat_id, "Действие отменено.").await;
        Ok(())
    }

    async fn session(&self, telegram_id: i64) -> Result<UserSession, BotError> {
        self.sessions.get(telegram_id).await
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    fn timezone_offset_minutes(&self) -> i32 {
        Utc::now()
            .with_timezone(&self.timezone)
            .offset()
            .fix()
            .local_minus_utc()
            / 60
    }

    /// Sends a message; transport failures are logged and swallowed.
    async fn send(&self, chat_id: i64, text: &str) -> Option<i32> {
        self.send_with(chat_id, text, None).await
    }

    async fn send_with(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) -> Option<i32> {
        match self.transport.send(chat_id, text, keyboard).await {
            Ok(message_id) => Some(message_id),
            Err(err) => {
                tracing::error!(chat_id, "Failed to send message: {err}");
                None
            }
        }
    }

    async fn send_inline(&self, chat_id: i64, text: &str, kb: InlineKeyboardMarkup) -> Option<i32> {
        self.send_with(chat_id, text, Some(Keyboard::Inline(kb))).await
    }

    /// Edits the keyboard's message in place, falling back to a new message.
    async fn edit_or_send(
        &self,
        chat_id: i64,
        message_id: Option<i32>,
        text: &str,
        kb: Option<InlineKeyboardMarkup>,
    ) {
        if let Some(message_id) = message_id {
            match self
                .transport
                .edit_message(chat_id, message_id, text, kb.clone())
                .await
            {
                Ok(()) => return,
                Err(err) => tracing::warn!(chat_id, "Failed to edit message: {err}"),
            }
        }
        self.send_with(chat_id, text, kb.map(Keyboard::Inline)).await;
    }
}

const RETRY_HINT: &str = "Повторите через несколько секунд.";
const LOGIN_HINT: &str = "Пожалуйста, войдите: /login";

pub(crate) fn user_message_for_error(err: &BotError) -> String {
    match err.kind() {
        ErrorKind::Transient => {
            format!("Сервис временно недоступен, попробуйте позже. {RETRY_HINT}")
        }
        ErrorKind::Unauthenticated => match err {
            BotError::RefreshTokenExpired => format!("Сессия истекла. {LOGIN_HINT}"),
            _ => format!("Требуется авторизация. {LOGIN_HINT}"),
        },
        ErrorKind::InvalidArgument => match err {
            BotError::InvalidArgument(message) => message.clone(),
            BotError::Api(api) => match api.server_message() {
                Some(message) => format!("Некорректные данные: {message}"),
                None => "Некорректные данные.".to_string(),
            },
            _ => "Некорректные данные.".to_string(),
        },
        ErrorKind::NotFound => "Не найдено, попробуйте ещё раз.".to_string(),
        ErrorKind::PermissionDenied => "Доступ запрещён.".to_string(),
        ErrorKind::Internal => "Произошла ошибка. Попробуйте позже.".to_string(),
    }
}
