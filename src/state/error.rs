//! Error types for harvest-state persistence.

use thiserror::Error;

use crate::db::DbErrorKind;

/// Errors reading or writing harvest watermarks.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    /// Database operation failed.
    #[error("harvest state database error ({kind}): {message}")]
    Database {
        /// Typed classification of the failure.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },
}

impl From<sqlx::Error> for StateError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}
