use api_types::Currency;
use chrono::Utc;
use store::UserPreferences;

use super::Dispatcher;
use crate::{
    error::{BotError, ErrorKind},
    ui,
};

const LANGUAGES: &[(&str, &str)] = &[("ru", "Русский"), ("en", "English")];

impl Dispatcher {
    pub(super) async fn language(&self, chat_id: i64) -> Result<(), BotError> {
        self.send_inline(chat_id, "Выберите язык:", ui::language_keyboard())
            .await;
        Ok(())
    }

    pub(super) async fn currency(&self, chat_id: i64) -> Result<(), BotError> {
        self.send_inline(
            chat_id,
            "Выберите валюту по умолчанию:",
            ui::currency_keyboard(),
        )
        .await;
        Ok(())
    }

    pub(super) async fn profile(&self, telegram_id: i64, chat_id: i64) -> Result<(), BotError> {
        let session = match self.session(telegram_id).await {
            Ok(session) => Some(session),
            Err(err) if err.kind() == ErrorKind::Unauthenticated => None,
            Err(err) => return Err(err),
        };
        let prefs = self.store.preferences(telegram_id).await?;
        self.send(
            chat_id,
            ui::render_profile(session.as_ref(), prefs.as_ref()).trim_end(),
        )
        .await;
        Ok(())
    }

    async fn update_preferences(
        &self,
        telegram_id: i64,
        update: impl FnOnce(&mut UserPreferences),
    ) -> Result<(), BotError> {
        let mut prefs = self
            .store
            .preferences(telegram_id)
            .await?
            .unwrap_or_else(|| UserPreferences::new(telegram_id));
        update(&mut prefs);
        prefs.updated_at = Some(Utc::now());
        self.store.save_preferences(&prefs).await?;
        Ok(())
    }

    pub(super) async fn set_language(
        &self,
        telegram_id: i64,
        chat_id: i64,
        message_id: Option<i32>,
        code: &str,
    ) -> Result<(), BotError> {
        let Some((code, name)) = LANGUAGES.iter().find(|(c, _)| *c == code) else {
            tracing::debug!(telegram_id, "Ignoring unknown language {code}");
            return Ok(());
        };
        self.update_preferences(telegram_id, |p| p.language = code.to_string())
            .await?;
        self.edit_or_send(chat_id, message_id, &format!("Язык: {name}"), None)
            .await;
        Ok(())
    }

    pub(super) async fn set_currency(
        &self,
        telegram_id: i64,
        chat_id: i64,
        message_id: Option<i32>,
        code: &str,
    ) -> Result<(), BotError> {
        let currency = Currency::try_from(code)
            .map_err(|err| BotError::InvalidArgument(format!("Валюта не поддерживается: {}", err.0)))?;
        self.update_preferences(telegram_id, |p| p.default_currency = Some(currency))
            .await?;
        self.edit_or_send(
            chat_id,
            message_id,
            &format!("Валюта по умолчанию: {}", currency.code()),
            None,
        )
        .await;
        Ok(())
    }
}
