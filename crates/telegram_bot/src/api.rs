//! JSON client for the remote auth, tenant, category, transaction, report
//! and FX services.
//!
//! The dispatcher and session manager only see the [`AuthApi`] and
//! [`FinanceApi`] traits, [`ApiClient`] is the HTTP implementation.

use api_types::{
    auth::{
        AuthLink, AuthLogsRequest, AuthLogsResponse, AuthStatus, AuthStatusRequest,
        Authenticated, CancelAuth, GenerateAuthLink, ListSessions, Login, RefreshToken, Register,
        RevokeSession, SessionsResponse, TelegramSession, TokenPair, Verified, VerifyAuthCode,
    },
    category::{
        CategoriesResponse, Category, CategoryDelete, CategoryList, CategoryNew, CategoryRename,
    },
    fx::{Rate, RateRequest},
    report::{MonthlySummary, MonthlySummaryRequest},
    tenant::{Membership, TenantsResponse},
    transaction::{
        ExportList, RecentList, TransactionCreated, TransactionListResponse, TransactionNew,
        TransactionView,
    },
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::ErrorKind;

#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Server { status: StatusCode, message: String },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(err) if err.is_decode() => ErrorKind::Internal,
            ApiError::Network(_) => ErrorKind::Transient,
            ApiError::Server { status, .. } => ErrorKind::from_status(*status),
        }
    }

    /// Message sent by the server, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server { message, .. } => Some(message),
            ApiError::Network(_) => None,
        }
    }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn generate_auth_link(&self, req: &GenerateAuthLink) -> Result<AuthLink, ApiError>;
    async fn verify_auth_code(&self, req: &VerifyAuthCode) -> Result<Verified, ApiError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
    async fn cancel_auth(&self, req: &CancelAuth) -> Result<(), ApiError>;
    async fn auth_status(&self, auth_token: &str) -> Result<AuthStatus, ApiError>;
    async fn list_sessions(&self, telegram_user_id: i64)
    -> Result<Vec<TelegramSession>, ApiError>;
    async fn revoke_session(&self, req: &RevokeSession) -> Result<(), ApiError>;
    async fn auth_logs(&self, req: &AuthLogsRequest) -> Result<AuthLogsResponse, ApiError>;
    async fn register(&self, req: &Register) -> Result<Authenticated, ApiError>;
    async fn login(&self, req: &Login) -> Result<Authenticated, ApiError>;
}

/// Services that act on behalf of a logged in user; every call carries the
/// access token as a bearer credential.
#[async_trait]
pub trait FinanceApi: Send + Sync {
    async fn list_tenants(&self, token: &str) -> Result<Vec<Membership>, ApiError>;
    async fn list_categories(
        &self,
        token: &str,
        req: &CategoryList,
    ) -> Result<Vec<Category>, ApiError>;
    async fn create_category(&self, token: &str, req: &CategoryNew)
    -> Result<Category, ApiError>;
    async fn rename_category(
        &self,
        token: &str,
        req: &CategoryRename,
    ) -> Result<Category, ApiError>;
    async fn delete_category(&self, token: &str, req: &CategoryDelete) -> Result<(), ApiError>;
    async fn create_transaction(
        &self,
        token: &str,
        req: &TransactionNew,
    ) -> Result<TransactionCreated, ApiError>;
    async fn list_recent(
        &self,
        token: &str,
        req: &RecentList,
    ) -> Result<Vec<TransactionView>, ApiError>;
    async fn list_for_export(
        &self,
        token: &str,
        req: &ExportList,
    ) -> Result<Vec<TransactionView>, ApiError>;
    async fn monthly_summary(
        &self,
        token: &str,
        req: &MonthlySummaryRequest,
    ) -> Result<MonthlySummary, ApiError>;
    async fn fx_rate(&self, token: &str, req: &RateRequest) -> Result<f64, ApiError>;
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request<TReq: serde::Serialize + ?Sized>(
        &self,
        token: Option<&str>,
        path: &str,
        body: &TReq,
    ) -> reqwest::RequestBuilder {
        let req = self.client.post(self.url(path)).json(body);
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn post_json<TReq: serde::Serialize + ?Sized, TResp: for<'de> serde::Deserialize<'de>>(
        &self,
        token: Option<&str>,
        path: &str,
        body: &TReq,
    ) -> Result<TResp, ApiError> {
        let resp = self.request(token, path, body).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<TResp>().await?);
        }
        Err(server_error(status, resp).await)
    }

    async fn post_json_unit<TReq: serde::Serialize + ?Sized>(
        &self,
        token: Option<&str>,
        path: &str,
        body: &TReq,
    ) -> Result<(), ApiError> {
        let resp = self.request(token, path, body).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(server_error(status, resp).await)
    }
}

async fn server_error(status: StatusCode, resp: reqwest::Response) -> ApiError {
    let message = match resp.json::<ErrorBody>().await {
        Ok(err) => err.error,
        Err(_) => "server error".to_string(),
    };
    ApiError::Server { status, message }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn generate_auth_link(&self, req: &GenerateAuthLink) -> Result<AuthLink, ApiError> {
        self.post_json(None, "/auth/link", req).await
    }

    async fn verify_auth_code(&self, req: &VerifyAuthCode) -> Result<Verified, ApiError> {
        self.post_json(None, "/auth/verify", req).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.post_json(
            None,
            "/auth/refresh",
            &RefreshToken {
                refresh_token: refresh_token.to_string(),
            },
        )
        .await
    }

    async fn cancel_auth(&self, req: &CancelAuth) -> Result<(), ApiError> {
        self.post_json_unit(None, "/auth/cancel", req).await
    }

    async fn auth_status(&self, auth_token: &str) -> Result<AuthStatus, ApiError> {
        self.post_json(
            None,
            "/auth/status",
            &AuthStatusRequest {
                auth_token: auth_token.to_string(),
            },
        )
        .await
    }

    async fn list_sessions(
        &self,
        telegram_user_id: i64,
    ) -> Result<Vec<TelegramSession>, ApiError> {
        let resp: SessionsResponse = self
            .post_json(None, "/auth/sessions", &ListSessions { telegram_user_id })
            .await?;
        Ok(resp.sessions)
    }

    async fn revoke_session(&self, req: &RevokeSession) -> Result<(), ApiError> {
        self.post_json_unit(None, "/auth/sessions/revoke", req).await
    }

    async fn auth_logs(&self, req: &AuthLogsRequest) -> Result<AuthLogsResponse, ApiError> {
        self.post_json(None, "/auth/logs", req).await
    }

    async fn register(&self, req: &Register) -> Result<Authenticated, ApiError> {
        self.post_json(None, "/auth/register", req).await
    }

    async fn login(&self, req: &Login) -> Result<Authenticated, ApiError> {
        self.post_json(None, "/auth/login", req).await
    }
}

#[async_trait]
impl FinanceApi for ApiClient {
    async fn list_tenants(&self, token: &str) -> Result<Vec<Membership>, ApiError> {
        let resp: TenantsResponse = self
            .post_json(Some(token), "/tenants/list", &serde_json::json!({}))
            .await?;
        Ok(resp.tenants)
    }

    async fn list_categories(
        &self,
        token: &str,
        req: &CategoryList,
    ) -> Result<Vec<Category>, ApiError> {
        let resp: CategoriesResponse = self.post_json(Some(token), "/categories/list", req).await?;
        Ok(resp.categories)
    }

    async fn create_category(
        &self,
        token: &str,
        req: &CategoryNew,
    ) -> Result<Category, ApiError> {
        self.post_json(Some(token), "/categories/create", req).await
    }

    async fn rename_category(
        &self,
        token: &str,
        req: &CategoryRename,
    ) -> Result<Category, ApiError> {
        self.post_json(Some(token), "/categories/rename", req).await
    }

    async fn delete_category(&self, token: &str, req: &CategoryDelete) -> Result<(), ApiError> {
        self.post_json_unit(Some(token), "/categories/delete", req)
            .await
    }

    async fn create_transaction(
        &self,
        token: &str,
        req: &TransactionNew,
    ) -> Result<TransactionCreated, ApiError> {
        self.post_json(Some(token), "/transactions/create", req)
            .await
    }

    async fn list_recent(
        &self,
        token: &str,
        req: &RecentList,
    ) -> Result<Vec<TransactionView>, ApiError> {
        let resp: TransactionListResponse = self
            .post_json(Some(token), "/transactions/recent", req)
            .await?;
        Ok(resp.transactions)
    }

    async fn list_for_export(
        &self,
        token: &str,
        req: &ExportList,
    ) -> Result<Vec<TransactionView>, ApiError> {
        let resp: TransactionListResponse = self
            .post_json(Some(token), "/transactions/export", req)
            .await?;
        Ok(resp.transactions)
    }

    async fn monthly_summary(
        &self,
        token: &str,
        req: &MonthlySummaryRequest,
    ) -> Result<MonthlySummary, ApiError> {
        self.post_json(Some(token), "/reports/monthly", req).await
    }

    async fn fx_rate(&self, token: &str, req: &RateRequest) -> Result<f64, ApiError> {
        let rate: Rate = self.post_json(Some(token), "/fx/rate", req).await?;
        Ok(rate.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(Client::new(), format!("{}/", server.uri()))
    }

    #[tokio::test]
    async fn finance_calls_send_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenants/list"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tenants": [{"tenant_id": "t1", "name": "Home", "role": "owner"}]
            })))
            .mount(&server)
            .await;

        let tenants = client(&server).list_tenants("tok-1").await.unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].name, "Home");
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_partial_json(serde_json::json!({"refresh_token": "r-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "a-2",
                "refresh_token": "r-2",
                "access_expires_at": "2030-01-01T00:00:00Z",
                "refresh_expires_at": "2030-02-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let pair = client(&server).refresh_token("r-1").await.unwrap();
        assert_eq!(pair.access_token, "a-2");
    }

    #[tokio::test]
    async fn server_errors_keep_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fx/rate"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(serde_json::json!({"error": "nope"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .fx_rate(
                "tok",
                &RateRequest {
                    from: "USD".into(),
                    to: "RUB".into(),
                    as_of: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.server_message(), Some("nope"));
    }

    #[tokio::test]
    async fn unreadable_error_body_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/cancel"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .cancel_auth(&CancelAuth {
                auth_token: "a".into(),
                telegram_user_id: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.server_message(), Some("server error"));
    }
}
