//! Process settings.
//!
//! Sources, lowest priority first: built-in defaults, an optional YAML file,
//! `BOT_*` environment variables (`BOT_TELEGRAM__TOKEN`, `BOT_API__ADDRESS`,
//! ...), and finally `TELEGRAM_BOT_TOKEN` for the token alone.

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("telegram.token is not set (use BOT_TELEGRAM__TOKEN or TELEGRAM_BOT_TOKEN)")]
    MissingToken,
    #[error("llm.api_key and llm.model are required when llm.enabled is set")]
    IncompleteLlm,
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    pub api_url: Option<String>,
    pub updates_timeout: u64,
    pub webhook_url: Option<String>,
    pub webhook_address: String,
    pub webhook_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub address: String,
    pub insecure: bool,
    pub timeout_secs: u64,
}

impl Api {
    /// Base URL; a bare `host:port` gets `http` or `https` from `insecure`.
    pub fn base_url(&self) -> String {
        if self.address.contains("://") {
            return self.address.clone();
        }
        let scheme = if self.insecure { "http" } else { "https" };
        format!("{scheme}://{}", self.address)
    }
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub dsn: String,
}

impl Database {
    /// sea-orm connection URL for `dsn`.
    pub fn url(&self) -> String {
        let dsn = self.dsn.trim();
        if dsn == ":memory:" {
            "sqlite::memory:".to_string()
        } else if dsn.starts_with("sqlite:") || dsn.contains("://") {
            dsn.to_string()
        } else {
            format!("sqlite:{dsn}?mode=rwc")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Logging {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Metrics {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuth {
    pub web_base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct Llm {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Shutdown {
    pub grace_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Parser {
    pub locales: Vec<String>,
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub telegram: Telegram,
    pub api: Api,
    pub database: Database,
    pub logging: Logging,
    pub metrics: Metrics,
    pub server: Server,
    pub oauth: OAuth,
    pub llm: Llm,
    pub shutdown: Shutdown,
    pub parser: Parser,
}

impl Settings {
    pub fn new(path: &Path) -> Result<Self, SettingsError> {
        Self::load(path, std::env::var("TELEGRAM_BOT_TOKEN").ok())
    }

    fn load(path: &Path, token: Option<String>) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .set_default("telegram.token", "")?
            .set_default("telegram.updates_timeout", 30)?
            .set_default("telegram.webhook_address", "0.0.0.0:8443")?
            .set_default("telegram.webhook_path", "/tg")?
            .set_default("api.address", "http://127.0.0.1:8080")?
            .set_default("api.insecure", true)?
            .set_default("api.timeout_secs", 10)?
            .set_default("database.dsn", "./data/bot.sqlite")?
            .set_default("logging.level", "debug")?
            .set_default("metrics.enabled", false)?
            .set_default("server.address", "0.0.0.0:8088")?
            .set_default("oauth.web_base_url", "")?
            .set_default("llm.enabled", false)?
            .set_default("llm.base_url", "https://openrouter.ai/api/v1")?
            .set_default("llm.api_key", "")?
            .set_default("llm.model", "")?
            .set_default("llm.timeout_secs", 10)?
            .set_default("shutdown.grace_secs", 10)?
            .set_default("parser.locales", vec!["ru"])?
            .set_default("parser.timezone", "Europe/Moscow")?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("BOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("parser.locales"),
            )
            .set_override_option("telegram.token", token.filter(|t| !t.is_empty()))?
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        if settings.telegram.token.trim().is_empty() {
            return Err(SettingsError::MissingToken);
        }
        if settings.llm.enabled && (settings.llm.api_key.is_empty() || settings.llm.model.is_empty())
        {
            return Err(SettingsError::IncompleteLlm);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("budget_bot_{name}_{}.yaml", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let path = write_config("defaults", "telegram:\n  token: \"123:abc\"\n");
        let settings = Settings::load(&path, None).unwrap();

        assert_eq!(settings.telegram.updates_timeout, 30);
        assert_eq!(settings.telegram.webhook_path, "/tg");
        assert!(settings.telegram.webhook_url.is_none());
        assert_eq!(settings.server.address, "0.0.0.0:8088");
        assert_eq!(settings.parser.locales, vec!["ru".to_string()]);
        assert_eq!(settings.shutdown.grace_secs, 10);
        assert!(!settings.metrics.enabled);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn token_is_required() {
        let path = write_config("no_token", "logging:\n  level: info\n");
        assert!(matches!(
            Settings::load(&path, None),
            Err(SettingsError::MissingToken)
        ));
        let settings = Settings::load(&path, Some("456:def".to_string())).unwrap();
        assert_eq!(settings.telegram.token, "456:def");
        assert_eq!(settings.logging.level, "info");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn enabled_llm_needs_key_and_model() {
        let path = write_config(
            "llm",
            "telegram:\n  token: \"123:abc\"\nllm:\n  enabled: true\n  model: m\n",
        );
        assert!(matches!(
            Settings::load(&path, None),
            Err(SettingsError::IncompleteLlm)
        ));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn dsn_becomes_sqlite_url() {
        let url = |dsn: &str| {
            Database {
                dsn: dsn.to_string(),
            }
            .url()
        };
        assert_eq!(url("./data/bot.sqlite"), "sqlite:./data/bot.sqlite?mode=rwc");
        assert_eq!(url(":memory:"), "sqlite::memory:");
        assert_eq!(url("sqlite:x.db"), "sqlite:x.db");
    }

    #[test]
    fn api_scheme_follows_insecure_flag() {
        let api = |address: &str, insecure| Api {
            address: address.to_string(),
            insecure,
            timeout_secs: 10,
        };
        assert_eq!(api("finance:8080", true).base_url(), "http://finance:8080");
        assert_eq!(api("finance:8080", false).base_url(), "https://finance:8080");
        assert_eq!(
            api("https://finance.example", true).base_url(),
            "https://finance.example"
        );
    }
}
