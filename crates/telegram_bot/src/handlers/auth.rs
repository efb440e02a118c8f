use store::{DialogContext, DialogState};

use super::Dispatcher;
use crate::{
    error::BotError,
    transport::Keyboard,
    ui,
};

const MIN_PASSWORD_LEN: usize = 8;

/// One `@`, a non-empty local part and a dotted domain of four or more chars.
pub(super) fn valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.len() >= 4
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

impl Dispatcher {
    pub(super) async fn login(&self, telegram_id: i64, chat_id: i64) -> Result<(), BotError> {
        self.store
            .set_state(
                telegram_id,
                DialogState::WaitingForOauthEmail,
                None,
                &DialogContext::new(),
            )
            .await?;
        self.send(chat_id, "Введите email для входа:").await;
        Ok(())
    }

    pub(super) async fn oauth_email(
        &self,
        telegram_id: i64,
        chat_id: i64,
        text: &str,
    ) -> Result<(), BotError> {
        let email = text.trim();
        if !valid_email(email) {
            return Err(BotError::InvalidArgument(
                "Некорректный email, попробуйте ещё раз:".to_string(),
            ));
        }

        let link = self.sessions.generate_auth_link(telegram_id, email).await?;
        self.store
            .set_state(
                telegram_id,
                DialogState::WaitingForOauthCode,
                None,
                &DialogContext::new()
                    .with("auth_token", link.auth_token.as_str())
                    .with("email", email),
            )
            .await?;
        self.send(
            chat_id,
            &format!(
                "Откройте ссылку для входа:\n{}\n\nСсылка действует до {}. После подтверждения отправьте код из браузера.",
                link.url,
                link.expires_at
                    .with_timezone(&self.timezone)
                    .format("%H:%M")
            ),
        )
        .await;
        Ok(())
    }

    pub(super) async fn oauth_code(
        &self,
        telegram_id: i64,
        chat_id: i64,
        context: &DialogContext,
        text: &str,
    ) -> Result<(), BotError> {
        let Some(auth_token) = context.text("auth_token") else {
            self.store.clear_state(telegram_id).await?;
            return Err(BotError::InvalidArgument(
                "Вход устарел, начните заново: /login".to_string(),
            ));
        };
        let code = text.trim();
        if code.is_empty() {
            return Err(BotError::InvalidArgument(
                "Введите код из браузера:".to_string(),
            ));
        }

        self.sessions.verify(telegram_id, auth_token, code).await?;
        self.store.clear_state(telegram_id).await?;
        self.send_with(
            chat_id,
            "Добро пожаловать! Отправьте сумму и описание, например «450 такси».",
            Some(Keyboard::Reply(ui::main_menu())),
        )
        .await;
        Ok(())
    }

    pub(super) async fn register(&self, telegram_id: i64, chat_id: i64) -> Result<(), BotError> {
        self.store
            .set_state(
                telegram_id,
                DialogState::WaitingForRegisterEmail,
                None,
                &DialogContext::new(),
            )
            .await?;
        self.send(chat_id, "Введите email для регистрации:").await;
        Ok(())
    }

    pub(super) async fn register_email(
        &self,
        telegram_id: i64,
        chat_id: i64,
        text: &str,
    ) -> Result<(), BotError> {
        let email = text.trim();
        if !valid_email(email) {
            return Err(BotError::InvalidArgument(
                "Некорректный email, попробуйте ещё раз:".to_string(),
            ));
        }
        self.store
            .set_state(
                telegram_id,
                DialogState::WaitingForRegisterPassword,
                None,
                &DialogContext::new().with("email", email),
            )
            .await?;
        self.send(
            chat_id,
            &format!("Придумайте пароль (не короче {MIN_PASSWORD_LEN} символов):"),
        )
        .await;
        Ok(())
    }

    pub(super) async fn register_password(
        &self,
        telegram_id: i64,
        chat_id: i64,
        context: &DialogContext,
        text: &str,
    ) -> Result<(), BotError> {
        let Some(email) = context.text("email") else {
            self.store.clear_state(telegram_id).await?;
            return Err(BotError::InvalidArgument(
                "Регистрация прервана, начните заново: /register".to_string(),
            ));
        };
        let password = text.trim();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BotError::InvalidArgument(format!(
                "Пароль должен быть не короче {MIN_PASSWORD_LEN} символов:"
            )));
        }
        self.store
            .set_state(
                telegram_id,
                DialogState::WaitingForRegisterName,
                None,
                &DialogContext::new()
                    .with("email", email)
                    .with("password", password),
            )
            .await?;
        self.send(chat_id, "Как вас зовут?").await;
        Ok(())
    }

    pub(super) async fn register_name(
        &self,
        telegram_id: i64,
        chat_id: i64,
        context: &DialogContext,
        text: &str,
    ) -> Result<(), BotError> {
        let (Some(email), Some(password)) = (context.text("email"), context.text("password"))
        else {
            self.store.clear_state(telegram_id).await?;
            return Err(BotError::InvalidArgument(
                "Регистрация прервана, начните заново: /register".to_string(),
            ));
        };
        let name = text.trim();
        if name.is_empty() {
            return Err(BotError::InvalidArgument("Введите имя:".to_string()));
        }

        self.sessions
            .register(telegram_id, email, password, name)
            .await?;
        self.store.clear_state(telegram_id).await?;
        self.send_with(
            chat_id,
            &format!("Регистрация завершена, {name}! Отправьте сумму и описание, например «450 такси»."),
            Some(Keyboard::Reply(ui::main_menu())),
        )
        .await;
        Ok(())
    }

    pub(super) async fn logout(&self, telegram_id: i64, chat_id: i64) -> Result<(), BotError> {
        self.sessions.logout(telegram_id).await?;
        self.store.clear_state(telegram_id).await?;
        self.send(chat_id, "Вы вышли из аккаунта.").await;
        Ok(())
    }

    pub(super) async fn switch_tenant(
        &self,
        telegram_id: i64,
        chat_id: i64,
    ) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let tenants = self.finance.list_tenants(&session.access_token).await?;
        if tenants.is_empty() {
            self.send(chat_id, "Нет доступных пространств.").await;
            return Ok(());
        }
        self.send_inline(
            chat_id,
            "Выберите пространство:",
            ui::tenant_keyboard(&tenants),
        )
        .await;
        Ok(())
    }

    pub(super) async fn tenant_picked(
        &self,
        telegram_id: i64,
        chat_id: i64,
        message_id: Option<i32>,
        tenant_id: &str,
    ) -> Result<(), BotError> {
        let session = self.session(telegram_id).await?;
        let tenants = self.finance.list_tenants(&session.access_token).await?;
        let Some(tenant) = tenants.iter().find(|t| t.tenant_id == tenant_id) else {
            return Err(BotError::InvalidArgument(
                "Пространство недоступно.".to_string(),
            ));
        };
        self.sessions.switch_tenant(telegram_id, tenant_id).await?;
        tracing::info!(telegram_id, tenant_id, "Tenant switched");
        self.edit_or_send(
            chat_id,
            message_id,
            &format!("Текущее пространство: {}", tenant.name),
            None,
        )
        .await;
        Ok(())
    }
}
