//! Database connection and schema management.
//!
//! One SQLite database holds both the record index and the per-source
//! harvest state. This module provides:
//! - Connection pool management
//! - WAL mode for file databases
//! - Embedded migrations
//! - A shared classification of `sqlx` failures used by the store errors
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("harvest.db")).await?;
//! // Hand db to SqliteRecordIndex / HarvestStateStore...
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Structured classification for store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// `SQLite` returned busy/locked.
    BusyOrLocked,
    /// Constraint failure (unique/check/not-null).
    ConstraintViolation,
    /// Pool timed out waiting for a connection.
    PoolTimeout,
    /// Pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure.
    Io,
    /// Unclassified database failure.
    Other,
}

impl DbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Database(database_error) => {
                let code = database_error.code();
                if matches!(code.as_deref(), Some("5" | "6" | "SQLITE_BUSY" | "SQLITE_LOCKED"))
                    || database_error.message().contains("database is locked")
                {
                    Self::BusyOrLocked
                } else if database_error.is_unique_violation()
                    || database_error.is_check_violation()
                    || code.as_deref().is_some_and(|c| c.starts_with("SQLITE_CONSTRAINT"))
                {
                    Self::ConstraintViolation
                } else {
                    Self::Other
                }
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

/// Database connection wrapper with connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path`, enables WAL and
    /// runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// Limited to one connection: every pooled connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.eq_ignore_ascii_case("wal"))
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_new_in_memory_succeeds() {
        let db = Database::new_in_memory().await;
        assert!(db.is_ok(), "Failed to create in-memory database");
    }

    #[tokio::test]
    async fn test_database_records_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO records (id, oai_identifier, title, institution, repository, date_indexed) \
             VALUES ('oai:1', 'oai:1', 'T', 'I', 'R', '2024-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_ok(), "records table should exist after migration");
    }

    #[tokio::test]
    async fn test_database_harvest_state_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO harvest_state (source_id, last_harvest_date) VALUES ('s', '2024-01-01')",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_ok(), "harvest_state table should exist after migration");
    }

    #[tokio::test]
    async fn test_database_records_primary_key_enforced() {
        let db = Database::new_in_memory().await.unwrap();
        let insert = "INSERT INTO records (id, oai_identifier, title, institution, repository, date_indexed) \
                      VALUES ('dup', 'dup', 'T', 'I', 'R', 'now')";

        sqlx::query(insert).execute(db.pool()).await.unwrap();
        let err = sqlx::query(insert).execute(db.pool()).await.unwrap_err();

        assert_eq!(DbErrorKind::from_sqlx(&err), DbErrorKind::ConstraintViolation);
    }

    #[tokio::test]
    async fn test_database_with_tempfile() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).await.unwrap();
        assert!(db.is_wal_enabled().await.unwrap(), "file databases use WAL");
        db.close().await;
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(DbErrorKind::BusyOrLocked.to_string(), "busy_or_locked");
        assert_eq!(
            DbErrorKind::from_sqlx(&sqlx::Error::RowNotFound),
            DbErrorKind::RowNotFound
        );
    }
}
