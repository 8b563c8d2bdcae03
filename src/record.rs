//! Canonical bibliographic record shared by every source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used when a source record carries no usable title.
pub const PLACEHOLDER_TITLE: &str = "Sin título";

/// A normalized record ready for indexing.
///
/// `id` always equals `oai_identifier`; the index upserts by `id`, so
/// re-harvesting a record replaces the previous copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub oai_identifier: String,
    pub title: String,
    pub authors: Vec<String>,
    pub institution: String,
    pub repository: String,
    /// Free-form date as published by the source (`YYYY`, `YYYY-MM-DD`, ...).
    pub date_issued: Option<String>,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub url_landing_page: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub language: Option<String>,
    pub collections: Vec<String>,
    pub date_indexed: DateTime<Utc>,
}
