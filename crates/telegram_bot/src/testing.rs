//! In-process fakes for the remote services and the chat transport.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
};

use api_types::{
    TransactionType,
    auth::{
        AuthLink, AuthLogsRequest, AuthLogsResponse, AuthStatus, Authenticated, CancelAuth,
        GenerateAuthLink, Login, Register, RevokeSession, TelegramSession, TokenPair, Verified,
        VerifyAuthCode,
    },
    category::{Category, CategoryDelete, CategoryList, CategoryNew, CategoryRename},
    fx::RateRequest,
    report::{MonthlySummary, MonthlySummaryRequest, SummaryItem},
    tenant::Membership,
    transaction::{ExportList, RecentList, TransactionCreated, TransactionNew, TransactionView},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use migration::MigratorTrait;
use reqwest::StatusCode;
use sea_orm::Database;
use store::Store;
use teloxide::types::InlineKeyboardMarkup;

use crate::{
    api::{ApiError, AuthApi, FinanceApi},
    transport::{Keyboard, Transport, TransportError},
};

pub(crate) async fn memory_store() -> Store {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Store::builder().database(db).build().unwrap()
}

fn token_pair(access: &str) -> TokenPair {
    TokenPair {
        access_token: access.to_string(),
        refresh_token: format!("refresh-{access}"),
        access_expires_at: Utc::now() + Duration::hours(1),
        refresh_expires_at: Utc::now() + Duration::days(30),
    }
}

pub(crate) fn category(id: &str, name: &str, kind: TransactionType) -> Category {
    Category {
        id: id.to_string(),
        code: id.to_string(),
        name: name.to_string(),
        emoji: String::new(),
        kind: Some(kind),
        active: true,
    }
}

#[derive(Default)]
pub(crate) struct FakeAuth {
    refreshes: AtomicUsize,
    cancels: AtomicUsize,
    reject_refresh: AtomicBool,
    user_agent: Mutex<Option<String>>,
}

impl FakeAuth {
    pub(crate) fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_calls(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub(crate) fn reject_refresh(&self) {
        self.reject_refresh.store(true, Ordering::SeqCst);
    }

    pub(crate) fn last_user_agent(&self) -> Option<String> {
        self.user_agent.lock().unwrap().clone()
    }

    /// Moves the stored access expiry into the past, keeping the refresh token valid.
    pub(crate) async fn expire_access(&self, store: &Store, telegram_id: i64) {
        let mut session = store.session(telegram_id).await.unwrap().unwrap();
        session.access_expires_at = Utc::now() - Duration::minutes(1);
        store.save_session(&session).await.unwrap();
    }
}

fn bad_request(message: &str) -> ApiError {
    ApiError::Server {
        status: StatusCode::BAD_REQUEST,
        message: message.to_string(),
    }
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn generate_auth_link(&self, req: &GenerateAuthLink) -> Result<AuthLink, ApiError> {
        *self.user_agent.lock().unwrap() = Some(req.user_agent.clone());
        Ok(AuthLink {
            url: "/oauth/confirm?t=auth-token".to_string(),
            auth_token: "auth-token".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        })
    }

    async fn verify_auth_code(&self, req: &VerifyAuthCode) -> Result<Verified, ApiError> {
        if req.code == "000000" {
            return Err(bad_request("invalid code"));
        }
        Ok(Verified {
            tokens: token_pair("access-0"),
            session_id: "s-1".to_string(),
            user_id: "user-1".to_string(),
            tenant_id: "tenant-1".to_string(),
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(ApiError::Server {
                status: StatusCode::UNAUTHORIZED,
                message: "invalid refresh token".to_string(),
            });
        }
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(token_pair(&format!("access-{n}")))
    }

    async fn cancel_auth(&self, _req: &CancelAuth) -> Result<(), ApiError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn auth_status(&self, _auth_token: &str) -> Result<AuthStatus, ApiError> {
        Ok(AuthStatus {
            status: "pending".to_string(),
            email: None,
            expires_at: Utc::now(),
        })
    }

    async fn list_sessions(&self, _telegram_user_id: i64) -> Result<Vec<TelegramSession>, ApiError> {
        Ok(vec![])
    }

    async fn revoke_session(&self, _req: &RevokeSession) -> Result<(), ApiError> {
        Ok(())
    }

    async fn auth_logs(&self, _req: &AuthLogsRequest) -> Result<AuthLogsResponse, ApiError> {
        Ok(AuthLogsResponse {
            entries: vec![],
            total: 0,
        })
    }

    async fn register(&self, req: &Register) -> Result<Authenticated, ApiError> {
        if req.password.len() < 8 {
            return Err(bad_request("password too short"));
        }
        Ok(Authenticated {
            user_id: "user-2".to_string(),
            tenant_id: "tenant-2".to_string(),
            tokens: token_pair("access-reg"),
        })
    }

    async fn login(&self, _req: &Login) -> Result<Authenticated, ApiError> {
        Ok(Authenticated {
            user_id: "user-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            tokens: token_pair("access-login"),
        })
    }
}

pub(crate) struct FakeFinance {
    calls: Mutex<Vec<&'static str>>,
    pub categories: Mutex<Vec<Category>>,
    pub created: Mutex<Vec<TransactionNew>>,
    pub recent: Mutex<Vec<TransactionView>>,
    pub fail_create: AtomicBool,
}

impl Default for FakeFinance {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            categories: Mutex::new(vec![
                category("food", "Еда", TransactionType::Expense),
                category("transport", "Транспорт", TransactionType::Expense),
                category("salary", "Зарплата", TransactionType::Income),
            ]),
            created: Mutex::default(),
            recent: Mutex::default(),
            fail_create: AtomicBool::new(false),
        }
    }
}

impl FakeFinance {
    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    pub(crate) fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    pub(crate) fn created(&self) -> Vec<TransactionNew> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl FinanceApi for FakeFinance {
    async fn list_tenants(&self, _token: &str) -> Result<Vec<Membership>, ApiError> {
        self.record("list_tenants");
        Ok(vec![
            Membership {
                tenant_id: "tenant-1".to_string(),
                name: "Дом".to_string(),
                role: "owner".to_string(),
            },
            Membership {
                tenant_id: "tenant-2".to_string(),
                name: "Работа".to_string(),
                role: "member".to_string(),
            },
        ])
    }

    async fn list_categories(
        &self,
        _token: &str,
        _req: &CategoryList,
    ) -> Result<Vec<Category>, ApiError> {
        self.record("list_categories");
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn create_category(&self, _token: &str, req: &CategoryNew) -> Result<Category, ApiError> {
        self.record("create_category");
        let created = category(&req.code, &req.name, TransactionType::Expense);
        self.categories.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn rename_category(
        &self,
        _token: &str,
        req: &CategoryRename,
    ) -> Result<Category, ApiError> {
        self.record("rename_category");
        let mut categories = self.categories.lock().unwrap();
        let found = categories
            .iter_mut()
            .find(|c| c.id == req.id)
            .ok_or_else(|| ApiError::Server {
                status: StatusCode::NOT_FOUND,
                message: "category not found".to_string(),
            })?;
        found.name = req.name.clone();
        Ok(found.clone())
    }

    async fn delete_category(&self, _token: &str, req: &CategoryDelete) -> Result<(), ApiError> {
        self.record("delete_category");
        self.categories.lock().unwrap().retain(|c| c.id != req.id);
        Ok(())
    }

    async fn create_transaction(
        &self,
        _token: &str,
        req: &TransactionNew,
    ) -> Result<TransactionCreated, ApiError> {
        self.record("create_transaction");
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ApiError::Server {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "unavailable".to_string(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push(req.clone());
        Ok(TransactionCreated {
            id: format!("tx-{}", created.len()),
        })
    }

    async fn list_recent(
        &self,
        _token: &str,
        req: &RecentList,
    ) -> Result<Vec<TransactionView>, ApiError> {
        self.record("list_recent");
        let recent = self.recent.lock().unwrap();
        Ok(recent.iter().take(req.limit as usize).cloned().collect())
    }

    async fn list_for_export(
        &self,
        _token: &str,
        req: &ExportList,
    ) -> Result<Vec<TransactionView>, ApiError> {
        self.record("list_for_export");
        let recent = self.recent.lock().unwrap();
        Ok(recent
            .iter()
            .filter(|t| t.occurred_at >= req.from && t.occurred_at < req.to)
            .take(req.limit as usize)
            .cloned()
            .collect())
    }

    async fn monthly_summary(
        &self,
        _token: &str,
        _req: &MonthlySummaryRequest,
    ) -> Result<MonthlySummary, ApiError> {
        self.record("monthly_summary");
        Ok(MonthlySummary {
            items: vec![
                SummaryItem {
                    category_id: "food".to_string(),
                    name: "Еда".to_string(),
                    kind: TransactionType::Expense,
                    total_minor: 300_000,
                },
                SummaryItem {
                    category_id: "transport".to_string(),
                    name: "Транспорт".to_string(),
                    kind: TransactionType::Expense,
                    total_minor: 45_000,
                },
            ],
            total_income_minor: 5_000_000,
            total_expense_minor: 345_000,
            currency: "RUB".to_string(),
        })
    }

    async fn fx_rate(&self, _token: &str, _req: &RateRequest) -> Result<f64, ApiError> {
        self.record("fx_rate");
        Ok(90.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Outgoing {
    Message {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        message_id: i32,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Answer(String),
    Document {
        file_name: String,
        data: Vec<u8>,
    },
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    log: Mutex<Vec<Outgoing>>,
    next_id: AtomicI32,
}

impl FakeTransport {
    pub(crate) fn log(&self) -> Vec<Outgoing> {
        self.log.lock().unwrap().clone()
    }

    /// Texts of sent and edited messages, in order.
    pub(crate) fn texts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|o| match o {
                Outgoing::Message { text, .. } | Outgoing::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last_text(&self) -> String {
        self.texts().pop().unwrap_or_default()
    }

    /// Callback payloads of the last inline keyboard that was sent or edited in.
    pub(crate) fn last_callbacks(&self) -> Vec<String> {
        use teloxide::types::InlineKeyboardButtonKind;

        self.log()
            .into_iter()
            .rev()
            .find_map(|o| match o {
                Outgoing::Message {
                    keyboard: Some(Keyboard::Inline(kb)),
                    ..
                }
                | Outgoing::Edit {
                    keyboard: Some(kb), ..
                } => Some(kb),
                _ => None,
            })
            .map(|kb| {
                kb.inline_keyboard
                    .iter()
                    .flatten()
                    .filter_map(|b| match &b.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i32, TransportError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.lock().unwrap().push(Outgoing::Message {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        _chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(Outgoing::Edit {
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .push(Outgoing::Answer(callback_id.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        _chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(Outgoing::Document {
            file_name: file_name.to_string(),
            data,
        });
        Ok(())
    }
}
