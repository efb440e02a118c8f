//! Telegram bot for personal finance.
//!
//! The bot is a thin client: money, categories and users live in the remote
//! finance and auth services. Locally it keeps only conversational state
//! (sessions, dialog states, drafts, keyword mappings, preferences) in the
//! [`store`] database.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use chrono_tz::Tz;
use reqwest::{Client, Url};
use store::Store;
use teloxide::{
    RequestError,
    prelude::*,
    update_listeners::{Polling, webhooks},
};
use tokio_util::sync::CancellationToken;

mod api;
mod commands;
mod error;
mod fx;
mod handlers;
mod llm;
mod metrics;
mod parsing;
mod resolver;
mod session;
#[cfg(test)]
mod testing;
mod transport;
mod ui;

pub use crate::metrics::register_metrics;
pub use api::{ApiClient, ApiError, AuthApi, FinanceApi};
pub use error::{BotError, ErrorKind};
pub use parsing::{ParseError, ParsedTransaction, Parser};
pub use session::SessionManager;

const DEFAULT_UPDATES_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TIMEZONE: &str = "Europe/Moscow";
const DEFAULT_WEBHOOK_PATH: &str = "/tg";

#[derive(Clone, Debug)]
struct Webhook {
    url: Url,
    address: SocketAddr,
    path: String,
}

pub struct Bot {
    bot: teloxide::Bot,
    router: Arc<handlers::Dispatcher>,
    webhook: Option<Webhook>,
    updates_timeout: Duration,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    /// Serves updates until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), RequestError> {
        tracing::info!("Starting telegram bot...");

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_callback_query().endpoint(on_callback));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.router.clone()])
            .default_handler(|upd| async move {
                tracing::warn!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .build();

        let token = dispatcher.shutdown_token();
        let stopper = tokio::spawn(async move {
            shutdown.cancelled().await;
            // The dispatcher may not have started polling yet.
            loop {
                match token.shutdown() {
                    Ok(done) => {
                        done.await;
                        break;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        });

        let listener_errors =
            LoggingErrorHandler::with_custom_text("An error from the update listener");
        match &self.webhook {
            Some(webhook) => {
                tracing::info!(
                    "Receiving updates via webhook {} on {}",
                    webhook.url,
                    webhook.address
                );
                let options = webhooks::Options::new(webhook.address, webhook.url.clone())
                    .path(webhook.path.clone());
                let listener = webhooks::axum(self.bot.clone(), options).await?;
                dispatcher
                    .dispatch_with_listener(listener, listener_errors)
                    .await;
            }
            None => {
                tracing::info!("Receiving updates via long polling");
                let listener = Polling::builder(self.bot.clone())
                    .timeout(self.updates_timeout)
                    .delete_webhook()
                    .await
                    .build();
                dispatcher
                    .dispatch_with_listener(listener, listener_errors)
                    .await;
            }
        }

        stopper.abort();
        tracing::info!("Telegram bot stopped");
        Ok(())
    }
}

async fn on_message(msg: Message, router: Arc<handlers::Dispatcher>) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        tracing::debug!(chat_id = msg.chat.id.0, "Ignoring non-text message");
        return Ok(());
    };
    router
        .handle(handlers::Incoming::Message {
            telegram_id: user.id.0 as i64,
            chat_id: msg.chat.id.0,
            text: text.to_string(),
        })
        .await;
    Ok(())
}

async fn on_callback(q: CallbackQuery, router: Arc<handlers::Dispatcher>) -> ResponseResult<()> {
    let telegram_id = q.from.id.0 as i64;
    let chat_id = q.message.as_ref().map_or(telegram_id, |m| m.chat().id.0);
    let message_id = q.message.as_ref().map(|m| m.id().0);
    router
        .handle(handlers::Incoming::Callback {
            telegram_id,
            chat_id,
            callback_id: q.id.0,
            message_id,
            data: q.data.unwrap_or_default(),
        })
        .await;
    Ok(())
}

#[derive(Clone, Debug)]
struct LlmSettings {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Default, Debug)]
pub struct BotBuilder {
    token: String,
    telegram_api_url: Option<String>,
    server: String,
    api_timeout: Option<Duration>,
    web_base_url: String,
    llm: Option<LlmSettings>,
    locales: Vec<String>,
    timezone: Option<String>,
    webhook_url: Option<String>,
    webhook_address: Option<SocketAddr>,
    webhook_path: Option<String>,
    updates_timeout: Option<Duration>,
    store: Option<Store>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    /// Overrides the Bot API base URL.
    pub fn telegram_api_url(mut self, url: &str) -> BotBuilder {
        self.telegram_api_url = Some(url.to_string());
        self
    }

    /// Base URL of the auth and finance services.
    pub fn server(mut self, server: &str, timeout: Duration) -> BotBuilder {
        self.server = server.to_string();
        self.api_timeout = Some(timeout);
        self
    }

    /// Prefix for relative login links.
    pub fn web_base_url(mut self, url: &str) -> BotBuilder {
        self.web_base_url = url.to_string();
        self
    }

    pub fn llm(mut self, base_url: &str, api_key: &str, model: &str, timeout: Duration) -> BotBuilder {
        self.llm = Some(LlmSettings {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
        });
        self
    }

    pub fn parser(mut self, locales: Vec<String>, timezone: &str) -> BotBuilder {
        self.locales = locales;
        self.timezone = Some(timezone.to_string());
        self
    }

    pub fn webhook(mut self, url: &str, address: SocketAddr, path: &str) -> BotBuilder {
        self.webhook_url = Some(url.to_string());
        self.webhook_address = Some(address);
        self.webhook_path = Some(path.to_string());
        self
    }

    pub fn updates_timeout(mut self, timeout: Duration) -> BotBuilder {
        self.updates_timeout = Some(timeout);
        self
    }

    pub fn store(mut self, store: Store) -> BotBuilder {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");

        if self.token.is_empty() {
            return Err("telegram token is required".to_string());
        }
        let store = self.store.ok_or("store is required")?;

        let timezone_name = self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE);
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|err| format!("invalid timezone {timezone_name}: {err}"))?;

        let mut bot = teloxide::Bot::new(&self.token);
        if let Some(url) = &self.telegram_api_url {
            let url = Url::parse(url).map_err(|err| format!("invalid telegram api url: {err}"))?;
            bot = bot.set_api_url(url);
        }

        let client = Client::builder()
            .timeout(self.api_timeout.unwrap_or(DEFAULT_API_TIMEOUT))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        let api = Arc::new(api::ApiClient::new(client, self.server));

        let llm = match self.llm {
            Some(settings) => {
                let client = Client::builder()
                    .timeout(settings.timeout)
                    .build()
                    .map_err(|err| format!("failed to build llm client: {err}"))?;
                Some(llm::LlmClassifier::new(
                    client,
                    &settings.base_url,
                    &settings.api_key,
                    &settings.model,
                ))
            }
            None => None,
        };

        let webhook = match self.webhook_url {
            Some(url) => Some(Webhook {
                url: Url::parse(&url).map_err(|err| format!("invalid webhook url: {err}"))?,
                address: self
                    .webhook_address
                    .ok_or("webhook address is required")?,
                path: self
                    .webhook_path
                    .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string()),
            }),
            None => None,
        };

        let locales = if self.locales.is_empty() {
            vec![resolver::DEFAULT_LOCALE.to_string()]
        } else {
            self.locales
        };

        let router = handlers::Dispatcher::new(handlers::DispatcherParts {
            store: store.clone(),
            sessions: session::SessionManager::new(store.clone(), api.clone(), &self.web_base_url),
            finance: api.clone(),
            resolver: resolver::CategoryResolver::new(store.clone(), api.clone(), llm),
            fx: fx::FxConverter::new(api, fx::RATE_TTL),
            parser: parsing::Parser::new(&locales, timezone),
            transport: Arc::new(transport::TeloxideTransport::new(bot.clone())),
            timezone,
        });

        Ok(Bot {
            bot,
            router: Arc::new(router),
            webhook,
            updates_timeout: self.updates_timeout.unwrap_or(DEFAULT_UPDATES_TIMEOUT),
        })
    }
}
