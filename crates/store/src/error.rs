//! Errors returned by the repository.
//!
//! - [`NotFound`] when an update targets a row that does not exist.
//! - [`Invalid`] when a value would break a table invariant.
//!
//!  [`NotFound`]: StoreError::NotFound
//!  [`Invalid`]: StoreError::Invalid
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("corrupted column {column}: {reason}")]
    Corrupted { column: &'static str, reason: String },
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for StoreError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Invalid(a), Self::Invalid(b)) => a == b,
            (
                Self::Corrupted { column: a, reason: ra },
                Self::Corrupted { column: b, reason: rb },
            ) => a == b && ra == rb,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
