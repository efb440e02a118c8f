use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Currencies the bot understands in free text and preferences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Rub,
    Usd,
    Eur,
    Gbp,
    Jpy,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Rub,
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
    ];

    /// ISO-4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Rub => "RUB",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Currency::Rub => '₽',
            Currency::Usd => '$',
            Currency::Eur => '€',
            Currency::Gbp => '£',
            Currency::Jpy => '¥',
        }
    }

    #[must_use]
    pub fn from_symbol(symbol: char) -> Option<Currency> {
        Self::ALL.into_iter().find(|c| c.symbol() == symbol)
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = UnsupportedCurrency;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        match value.to_ascii_uppercase().as_str() {
            "RUB" => Ok(Currency::Rub),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            _ => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(symbol), None) => {
                        Currency::from_symbol(symbol).ok_or_else(|| UnsupportedCurrency(value.into()))
                    }
                    _ => Err(UnsupportedCurrency(value.to_string())),
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Expense,
    Income,
}

impl TransactionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransactionType::Expense => "expense",
            TransactionType::Income => "income",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "expense" => Ok(TransactionType::Expense),
            "income" => Ok(TransactionType::Income),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

pub mod auth {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GenerateAuthLink {
        pub email: String,
        pub telegram_user_id: i64,
        pub user_agent: String,
        pub ip_address: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthLink {
        /// Absolute URL, or a path relative to the OAuth web base.
        pub url: String,
        pub auth_token: String,
        pub expires_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct VerifyAuthCode {
        pub auth_token: String,
        pub code: String,
        pub telegram_user_id: i64,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TokenPair {
        pub access_token: String,
        pub refresh_token: String,
        pub access_expires_at: DateTime<Utc>,
        pub refresh_expires_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Verified {
        pub tokens: TokenPair,
        pub session_id: String,
        pub user_id: String,
        pub tenant_id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RefreshToken {
        pub refresh_token: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CancelAuth {
        pub auth_token: String,
        pub telegram_user_id: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthStatusRequest {
        pub auth_token: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthStatus {
        pub status: String,
        pub email: Option<String>,
        pub expires_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ListSessions {
        pub telegram_user_id: i64,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct TelegramSession {
        pub session_id: String,
        pub user_id: String,
        pub created_at: DateTime<Utc>,
        pub last_used_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SessionsResponse {
        pub sessions: Vec<TelegramSession>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RevokeSession {
        pub session_id: String,
        pub telegram_user_id: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthLogsRequest {
        pub telegram_user_id: i64,
        pub limit: i32,
        pub offset: i32,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AuthLogEntry {
        pub action: String,
        pub success: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthLogsResponse {
        pub entries: Vec<AuthLogEntry>,
        pub total: i32,
    }

    /// Direct-credentials registration.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct Register {
        pub email: String,
        pub password: String,
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Login {
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Authenticated {
        pub user_id: String,
        pub tenant_id: String,
        pub tokens: TokenPair,
    }
}

pub mod tenant {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Membership {
        pub tenant_id: String,
        pub name: String,
        pub role: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TenantsResponse {
        pub tenants: Vec<Membership>,
    }
}

pub mod category {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Category {
        pub id: String,
        #[serde(default)]
        pub code: String,
        pub name: String,
        #[serde(default)]
        pub emoji: String,
        #[serde(default)]
        pub kind: Option<TransactionType>,
        #[serde(default = "default_active")]
        pub active: bool,
    }

    fn default_active() -> bool {
        true
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryList {
        pub tenant_id: String,
        pub locale: String,
        pub include_inactive: bool,
        pub kind: Option<TransactionType>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Vec<Category>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryNew {
        pub tenant_id: String,
        pub code: String,
        pub name: String,
        pub locale: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryRename {
        pub tenant_id: String,
        pub id: String,
        pub name: String,
        pub locale: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryDelete {
        pub tenant_id: String,
        pub id: String,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub tenant_id: String,
        #[serde(rename = "type")]
        pub kind: TransactionType,
        pub amount_minor: i64,
        pub currency: String,
        pub description: String,
        pub category_id: String,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub id: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: String,
        #[serde(rename = "type")]
        pub kind: TransactionType,
        pub amount_minor: i64,
        pub currency: String,
        #[serde(default)]
        pub category_id: String,
        #[serde(default)]
        pub comment: String,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RecentList {
        pub tenant_id: String,
        pub limit: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExportList {
        pub tenant_id: String,
        pub from: DateTime<Utc>,
        pub to: DateTime<Utc>,
        pub limit: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }
}

pub mod report {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MonthlySummaryRequest {
        pub tenant_id: String,
        pub year: i32,
        pub month: u32,
        pub timezone_offset_minutes: i32,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct SummaryItem {
        pub category_id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub kind: TransactionType,
        pub total_minor: i64,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct MonthlySummary {
        pub items: Vec<SummaryItem>,
        pub total_income_minor: i64,
        pub total_expense_minor: i64,
        pub currency: String,
    }
}

pub mod fx {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RateRequest {
        pub from: String,
        pub to: String,
        pub as_of: NaiveDate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Rate {
        pub rate: f64,
    }
}
