//! Record index: where mapped records are sent.
//!
//! The harvester only needs [`RecordIndex::index_record`]; the SQLite
//! implementation adds lookup, search and aggregate statistics on top.

mod error;
mod sqlite;

pub use error::IndexError;
pub use sqlite::SqliteRecordIndex;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;

use crate::record::CanonicalRecord;

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Default page size for [`SearchQuery`].
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Downstream consumer of canonical records.
///
/// Implementations must upsert by [`CanonicalRecord::id`]: indexing the same
/// id twice leaves one entry holding the latest copy.
#[async_trait]
pub trait RecordIndex: Send + Sync {
    /// Stores or replaces one record.
    async fn index_record(&self, record: &CanonicalRecord) -> Result<()>;
}

/// Filters and pagination for [`SqliteRecordIndex::search_advanced`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Substring matched against title, abstract, authors and keywords.
    pub text: Option<String>,
    /// Exact `type` match.
    pub record_type: Option<String>,
    /// Exact `repository` match.
    pub repository: Option<String>,
    /// Inclusive lower bound on the issued year.
    pub year_from: Option<i32>,
    /// Inclusive upper bound on the issued year.
    pub year_to: Option<i32>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            record_type: None,
            repository: None,
            year_from: None,
            year_to: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchQuery {
    /// Row offset of the requested page; page 0 is treated as page 1.
    ///
    /// Saturates at `i64::MAX` for pages beyond any real result set.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1).saturating_mul(self.limit())
    }

    /// Page size, never below 1.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size.max(1))
    }
}

/// Record count per repository.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct RepositoryCount {
    pub repository: String,
    pub count: i64,
}

/// Record count per `type` (records without a type are grouped under `None`).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TypeCount {
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub count: i64,
}

/// Record count per issued year.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct YearCount {
    pub year: i64,
    pub count: i64,
}
