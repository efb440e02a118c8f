//! Error kinds shared by the bot components.
//!
//! Components return [`BotError`] to their caller untouched; only the
//! dispatcher turns an error into user-facing text, based on [`ErrorKind`].

use reqwest::StatusCode;
use store::StoreError;

use crate::api::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failures, unavailable backends, rate limits and deadlines.
    Transient,
    Unauthenticated,
    InvalidArgument,
    NotFound,
    PermissionDenied,
    Internal,
}

impl ErrorKind {
    pub(crate) fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ErrorKind::Unauthenticated,
            StatusCode::FORBIDDEN => ErrorKind::PermissionDenied,
            StatusCode::NOT_FOUND => ErrorKind::NotFound,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ErrorKind::InvalidArgument
            }
            StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Transient,
            _ => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("session not found")]
    SessionNotFound,
    #[error("refresh_token_expired")]
    RefreshTokenExpired,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

impl BotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::SessionNotFound | BotError::RefreshTokenExpired => {
                ErrorKind::Unauthenticated
            }
            BotError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BotError::Api(err) => err.kind(),
            BotError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            BotError::Store(StoreError::Invalid(_)) => ErrorKind::InvalidArgument,
            BotError::Store(_) | BotError::Export(_) => ErrorKind::Internal,
        }
    }
}

/// Keeps a short prefix of a secret for log lines.
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    if prefix.len() == secret.len() {
        "***".to_string()
    } else {
        format!("{prefix}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(
            ErrorKind::from_status(StatusCode::UNAUTHORIZED),
            ErrorKind::Unauthenticated
        );
        assert_eq!(
            ErrorKind::from_status(StatusCode::UNPROCESSABLE_ENTITY),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            ErrorKind::from_status(StatusCode::SERVICE_UNAVAILABLE),
            ErrorKind::Transient
        );
        assert_eq!(
            ErrorKind::from_status(StatusCode::IM_A_TEAPOT),
            ErrorKind::Internal
        );
    }

    #[test]
    fn store_errors_have_kinds() {
        assert_eq!(
            BotError::from(StoreError::NotFound("x".into())).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(BotError::RefreshTokenExpired.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn redact_keeps_prefix_only() {
        assert_eq!(redact("abcdefghijkl"), "abcdef…");
        assert_eq!(redact("abc"), "***");
    }
}
