//! Per-source harvest watermarks.
//!
//! Each source has at most one row holding the date (`YYYY-MM-DD`, UTC) of
//! its last successful harvest. Incremental harvests pass that date as the
//! OAI `from` argument. Writes are upserts: last write wins, no history.

mod error;

pub use error::StateError;

use chrono::Utc;
use serde::Serialize;
use sqlx::FromRow;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// One source's stored watermark.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct HarvestState {
    pub source_id: String,
    pub last_harvest_date: Option<String>,
}

/// Today's UTC date in OAI day granularity.
#[must_use]
pub fn today_utc() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// SQLite-backed watermark store.
#[derive(Debug, Clone)]
pub struct HarvestStateStore {
    db: Database,
}

impl HarvestStateStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the stored watermark, or `None` if the source was never
    /// harvested (or its stored date is blank).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, source_id: &str) -> Result<Option<String>> {
        let date: Option<Option<String>> = sqlx::query_scalar(
            r"SELECT last_harvest_date FROM harvest_state WHERE source_id = ?",
        )
        .bind(source_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(date.flatten().filter(|value| !value.trim().is_empty()))
    }

    /// Stores `date` as the watermark, or today's UTC date when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the upsert fails.
    #[instrument(skip(self))]
    pub async fn set(&self, source_id: &str, date: Option<&str>) -> Result<()> {
        let date = date.map_or_else(today_utc, str::to_string);

        sqlx::query(
            r"INSERT INTO harvest_state (source_id, last_harvest_date)
              VALUES (?, ?)
              ON CONFLICT(source_id) DO UPDATE SET last_harvest_date = excluded.last_harvest_date",
        )
        .bind(source_id)
        .bind(&date)
        .execute(self.db.pool())
        .await?;

        debug!(source_id, date = %date, "stored harvest watermark");
        Ok(())
    }

    /// Lists every stored watermark ordered by source id.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<HarvestState>> {
        let rows = sqlx::query_as::<_, HarvestState>(
            r"SELECT source_id, last_harvest_date FROM harvest_state ORDER BY source_id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}
