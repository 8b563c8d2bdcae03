//! Error types for the record index.

use thiserror::Error;

use crate::db::DbErrorKind;

/// Errors raised by [`super::RecordIndex`] implementations.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// Database operation failed.
    #[error("index database error ({kind}): {message}")]
    Database {
        /// Typed classification of the failure.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// A stored or outgoing column could not be (de)serialized.
    #[error("index serialization error for record {id}: {message}")]
    Serialization {
        /// The record id involved.
        id: String,
        /// What went wrong.
        message: String,
    },
}

impl From<sqlx::Error> for IndexError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl IndexError {
    /// Creates a serialization error for the given record.
    pub fn serialization(id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Serialization {
            id: id.into(),
            message: message.to_string(),
        }
    }
}
