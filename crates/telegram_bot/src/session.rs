//! Token lifecycle of remote sessions.
//!
//! [`SessionManager::get`] refreshes an expired access token on demand. A
//! per-user lock serializes refreshes, because the auth service invalidates
//! a refresh token once it has been used.

use std::{collections::HashMap, sync::Arc};

use api_types::auth::{
    AuthLink, AuthLogsRequest, AuthLogsResponse, AuthStatus, CancelAuth, GenerateAuthLink, Login,
    Register, RevokeSession, TelegramSession, TokenPair, VerifyAuthCode,
};
use chrono::Utc;
use store::{Store, UserSession};
use tokio::sync::Mutex;

use crate::{
    api::AuthApi,
    error::{BotError, ErrorKind, redact},
};

pub(crate) const USER_AGENT: &str = "TelegramBot/1.0";

#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    auth: Arc<dyn AuthApi>,
    web_base_url: String,
    refresh_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl SessionManager {
    pub fn new(store: Store, auth: Arc<dyn AuthApi>, web_base_url: &str) -> Self {
        Self {
            store,
            auth,
            web_base_url: web_base_url.trim_end_matches('/').to_string(),
            refresh_locks: Arc::default(),
        }
    }

    /// Asks the auth service for a login link. Relative links are joined to
    /// the OAuth web base URL.
    pub async fn generate_auth_link(
        &self,
        telegram_id: i64,
        email: &str,
    ) -> Result<AuthLink, BotError> {
        let mut link = self
            .auth
            .generate_auth_link(&GenerateAuthLink {
                email: email.to_string(),
                telegram_user_id: telegram_id,
                user_agent: USER_AGENT.to_string(),
                ip_address: String::new(),
            })
            .await?;
        if !link.url.starts_with("http://") && !link.url.starts_with("https://") {
            link.url = format!("{}/{}", self.web_base_url, link.url.trim_start_matches('/'));
        }
        Ok(link)
    }

    /// Exchanges the code shown on the web page for a session.
    pub async fn verify(
        &self,
        telegram_id: i64,
        auth_token: &str,
        code: &str,
    ) -> Result<UserSession, BotError> {
        let verified = self
            .auth
            .verify_auth_code(&VerifyAuthCode {
                auth_token: auth_token.to_string(),
                code: code.to_string(),
                telegram_user_id: telegram_id,
            })
            .await?;
        tracing::info!(
            telegram_id,
            session_id = %verified.session_id,
            "OAuth verification succeeded"
        );
        self.persist(telegram_id, verified.user_id, verified.tenant_id, verified.tokens)
            .await
    }

    pub async fn register(
        &self,
        telegram_id: i64,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<UserSession, BotError> {
        let auth = self
            .auth
            .register(&Register {
                email: email.to_string(),
                password: password.to_string(),
                name: name.to_string(),
            })
            .await?;
        self.persist(telegram_id, auth.user_id, auth.tenant_id, auth.tokens)
            .await
    }

    pub async fn login(
        &self,
        telegram_id: i64,
        email: &str,
        password: &str,
    ) -> Result<UserSession, BotError> {
        let auth = self
            .auth
            .login(&Login {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.persist(telegram_id, auth.user_id, auth.tenant_id, auth.tokens)
            .await
    }

    async fn persist(
        &self,
        telegram_id: i64,
        user_id: String,
        tenant_id: String,
        tokens: TokenPair,
    ) -> Result<UserSession, BotError> {
        let now = Utc::now();
        let session = UserSession {
            telegram_id,
            user_id,
            tenant_id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
            created_at: now,
            updated_at: now,
        };
        self.store.save_session(&session).await?;
        Ok(session)
    }

    async fn refresh_lock(&self, telegram_id: i64) -> Arc<Mutex<()>> {
        self.refresh_locks
            .lock()
            .await
            .entry(telegram_id)
            .or_default()
            .clone()
    }

    /// Forgets the user's lock once no other update holds a handle to it.
    async fn release_refresh_lock(&self, telegram_id: i64, lock: Arc<Mutex<()>>) {
        let mut locks = self.refresh_locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&telegram_id);
        }
    }

    /// Returns a session with a usable access token.
    ///
    /// Fails with [`BotError::SessionNotFound`] when the user never logged in
    /// and with [`BotError::RefreshTokenExpired`] when the refresh token ran
    /// out, in which case the session is deleted.
    pub async fn get(&self, telegram_id: i64) -> Result<UserSession, BotError> {
        let session = self
            .store
            .session(telegram_id)
            .await?
            .ok_or(BotError::SessionNotFound)?;
        if !session.access_expired(Utc::now()) {
            return Ok(session);
        }

        let lock = self.refresh_lock(telegram_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.refresh(telegram_id).await
        };
        self.release_refresh_lock(telegram_id, lock).await;
        result
    }

    async fn refresh(&self, telegram_id: i64) -> Result<UserSession, BotError> {
        // Another update may have refreshed while we waited.
        let mut session = self
            .store
            .session(telegram_id)
            .await?
            .ok_or(BotError::SessionNotFound)?;
        let now = Utc::now();
        if !session.access_expired(now) {
            return Ok(session);
        }
        if session.refresh_expired(now) {
            tracing::info!(telegram_id, "Refresh token expired, evicting session");
            self.store.delete_session(telegram_id).await?;
            return Err(BotError::RefreshTokenExpired);
        }

        tracing::debug!(
            telegram_id,
            refresh_token = %redact(&session.refresh_token),
            "Refreshing access token"
        );
        let tokens = match self.auth.refresh_token(&session.refresh_token).await {
            Ok(tokens) => tokens,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Unauthenticated | ErrorKind::InvalidArgument
                ) =>
            {
                tracing::warn!(telegram_id, "Refresh rejected, evicting session: {err}");
                self.store.delete_session(telegram_id).await?;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        session.access_token = tokens.access_token;
        session.refresh_token = tokens.refresh_token;
        session.access_expires_at = tokens.access_expires_at;
        session.refresh_expires_at = tokens.refresh_expires_at;
        session.updated_at = now;
        self.store.save_session(&session).await?;
        Ok(session)
    }

    /// Deletes the stored session. Logging out twice is fine.
    pub async fn logout(&self, telegram_id: i64) -> Result<(), BotError> {
        self.store.delete_session(telegram_id).await?;
        Ok(())
    }

    pub async fn switch_tenant(&self, telegram_id: i64, tenant_id: &str) -> Result<(), BotError> {
        self.store
            .update_session_tenant(telegram_id, tenant_id)
            .await?;
        Ok(())
    }

    /// Best effort; the pending login simply expires on failure.
    pub async fn cancel_auth(&self, telegram_id: i64, auth_token: &str) {
        if let Err(err) = self
            .auth
            .cancel_auth(&CancelAuth {
                auth_token: auth_token.to_string(),
                telegram_user_id: telegram_id,
            })
            .await
        {
            tracing::warn!(telegram_id, "Failed to cancel pending auth: {err}");
        }
    }

    pub async fn auth_status(&self, auth_token: &str) -> Result<AuthStatus, BotError> {
        Ok(self.auth.auth_status(auth_token).await?)
    }

    pub async fn list_sessions(&self, telegram_id: i64) -> Result<Vec<TelegramSession>, BotError> {
        Ok(self.auth.list_sessions(telegram_id).await?)
    }

    pub async fn revoke_session(&self, telegram_id: i64, session_id: &str) -> Result<(), BotError> {
        self.auth
            .revoke_session(&RevokeSession {
                session_id: session_id.to_string(),
                telegram_user_id: telegram_id,
            })
            .await?;
        Ok(())
    }

    pub async fn auth_logs(
        &self,
        telegram_id: i64,
        limit: i32,
        offset: i32,
    ) -> Result<AuthLogsResponse, BotError> {
        Ok(self
            .auth
            .auth_logs(&AuthLogsRequest {
                telegram_user_id: telegram_id,
                limit,
                offset,
            })
            .await?)
    }
}
