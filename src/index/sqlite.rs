//! SQLite implementation of [`RecordIndex`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::record::CanonicalRecord;

use super::{IndexError, RecordIndex, RepositoryCount, Result, SearchQuery, TypeCount, YearCount};

const RECORD_COLUMNS: &str = "id, oai_identifier, title, authors, institution, repository, \
     date_issued, type, url_landing_page, abstract, keywords, language, collections, date_indexed";

/// Columns as stored; list fields are JSON arrays.
#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    oai_identifier: String,
    title: String,
    authors: String,
    institution: String,
    repository: String,
    date_issued: Option<String>,
    #[sqlx(rename = "type")]
    record_type: Option<String>,
    url_landing_page: Option<String>,
    #[sqlx(rename = "abstract")]
    abstract_text: Option<String>,
    keywords: String,
    language: Option<String>,
    collections: String,
    date_indexed: String,
}

impl TryFrom<RecordRow> for CanonicalRecord {
    type Error = IndexError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let authors = decode_list(&row.id, "authors", &row.authors)?;
        let keywords = decode_list(&row.id, "keywords", &row.keywords)?;
        let collections = decode_list(&row.id, "collections", &row.collections)?;
        let date_indexed = DateTime::parse_from_rfc3339(&row.date_indexed)
            .map_err(|e| IndexError::serialization(&row.id, format!("date_indexed: {e}")))?
            .with_timezone(&Utc);

        Ok(Self {
            id: row.id,
            oai_identifier: row.oai_identifier,
            title: row.title,
            authors,
            institution: row.institution,
            repository: row.repository,
            date_issued: row.date_issued,
            record_type: row.record_type,
            url_landing_page: row.url_landing_page,
            abstract_text: row.abstract_text,
            keywords,
            language: row.language,
            collections,
            date_indexed,
        })
    }
}

fn decode_list(id: &str, column: &str, raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| IndexError::serialization(id, format!("{column}: {e}")))
}

fn encode_list(id: &str, values: &[String]) -> Result<String> {
    serde_json::to_string(values).map_err(|e| IndexError::serialization(id, e))
}

fn into_records(rows: Vec<RecordRow>) -> Result<Vec<CanonicalRecord>> {
    rows.into_iter().map(CanonicalRecord::try_from).collect()
}

/// Record index stored in the harvest database.
#[derive(Debug, Clone)]
pub struct SqliteRecordIndex {
    db: Database,
}

impl SqliteRecordIndex {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetches one record by id.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the query fails or the stored row is corrupt.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<CanonicalRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(CanonicalRecord::try_from).transpose()
    }

    /// Total number of indexed records.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Substring search over title, abstract, authors and keywords.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the query fails or a row is corrupt.
    #[instrument(skip(self))]
    pub async fn search_simple(&self, text: &str, limit: u32) -> Result<Vec<CanonicalRecord>> {
        self.search_advanced(&SearchQuery {
            text: Some(text.to_string()),
            page: 1,
            page_size: limit,
            ..SearchQuery::default()
        })
        .await
    }

    /// Filtered, paginated search ordered by `date_issued` (newest first).
    ///
    /// Year bounds compare the first four characters of `date_issued`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the query fails or a row is corrupt.
    #[instrument(skip(self))]
    pub async fn search_advanced(&self, query: &SearchQuery) -> Result<Vec<CanonicalRecord>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM records WHERE 1 = 1"));

        if let Some(text) = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{text}%");
            builder.push(" AND (");
            for (i, column) in ["title", "abstract", "authors", "keywords"].iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push(*column).push(" LIKE ").push_bind(pattern.clone());
            }
            builder.push(")");
        }
        if let Some(record_type) = &query.record_type {
            builder.push(" AND type = ").push_bind(record_type.clone());
        }
        if let Some(repository) = &query.repository {
            builder.push(" AND repository = ").push_bind(repository.clone());
        }
        if let Some(year_from) = query.year_from {
            builder
                .push(" AND CAST(substr(date_issued, 1, 4) AS INTEGER) >= ")
                .push_bind(year_from);
        }
        if let Some(year_to) = query.year_to {
            builder
                .push(" AND CAST(substr(date_issued, 1, 4) AS INTEGER) <= ")
                .push_bind(year_to);
        }

        builder
            .push(" ORDER BY date_issued DESC, id ASC LIMIT ")
            .push_bind(query.limit())
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows: Vec<RecordRow> = builder
            .build_query_as()
            .fetch_all(self.db.pool())
            .await?;
        into_records(rows)
    }

    /// Record counts per repository, largest first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn stats_by_repository(&self) -> Result<Vec<RepositoryCount>> {
        let rows = sqlx::query_as::<_, RepositoryCount>(
            r"SELECT repository, COUNT(*) AS count
              FROM records
              GROUP BY repository
              ORDER BY count DESC, repository ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Record counts per type, largest first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn stats_by_type(&self) -> Result<Vec<TypeCount>> {
        let rows = sqlx::query_as::<_, TypeCount>(
            r"SELECT type, COUNT(*) AS count
              FROM records
              GROUP BY type
              ORDER BY count DESC, type ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Record counts per issued year, ascending. Records whose date does not
    /// start with four digits are left out.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn stats_by_year(&self) -> Result<Vec<YearCount>> {
        let rows = sqlx::query_as::<_, YearCount>(
            r"SELECT CAST(substr(date_issued, 1, 4) AS INTEGER) AS year, COUNT(*) AS count
              FROM records
              WHERE date_issued IS NOT NULL
                AND substr(date_issued, 1, 4) GLOB '[0-9][0-9][0-9][0-9]'
              GROUP BY year
              ORDER BY year ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl RecordIndex for SqliteRecordIndex {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn index_record(&self, record: &CanonicalRecord) -> Result<()> {
        let authors = encode_list(&record.id, &record.authors)?;
        let keywords = encode_list(&record.id, &record.keywords)?;
        let collections = encode_list(&record.id, &record.collections)?;

        sqlx::query(&format!(
            r"INSERT INTO records ({RECORD_COLUMNS})
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(id) DO UPDATE SET
                oai_identifier = excluded.oai_identifier,
                title = excluded.title,
                authors = excluded.authors,
                institution = excluded.institution,
                repository = excluded.repository,
                date_issued = excluded.date_issued,
                type = excluded.type,
                url_landing_page = excluded.url_landing_page,
                abstract = excluded.abstract,
                keywords = excluded.keywords,
                language = excluded.language,
                collections = excluded.collections,
                date_indexed = excluded.date_indexed"
        ))
        .bind(&record.id)
        .bind(&record.oai_identifier)
        .bind(&record.title)
        .bind(authors)
        .bind(&record.institution)
        .bind(&record.repository)
        .bind(&record.date_issued)
        .bind(&record.record_type)
        .bind(&record.url_landing_page)
        .bind(&record.abstract_text)
        .bind(keywords)
        .bind(&record.language)
        .bind(collections)
        .bind(record.date_indexed.to_rfc3339())
        .execute(self.db.pool())
        .await?;

        debug!("indexed record");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str, date: Option<&str>) -> CanonicalRecord {
        CanonicalRecord {
            id: id.to_string(),
            oai_identifier: id.to_string(),
            title: title.to_string(),
            authors: vec!["García, Luis".to_string(), "Smith, J.".to_string()],
            institution: "UH".to_string(),
            repository: "Repo".to_string(),
            date_issued: date.map(str::to_string),
            record_type: Some("Article".to_string()),
            url_landing_page: Some("https://repo.example/1".to_string()),
            abstract_text: None,
            keywords: vec!["física".to_string()],
            language: None,
            collections: vec![],
            date_indexed: Utc::now(),
        }
    }

    async fn index() -> SqliteRecordIndex {
        SqliteRecordIndex::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_index_then_get_round_trips_fields() {
        let index = index().await;
        let original = record("oai:1", "Título", Some("2020"));
        index.index_record(&original).await.unwrap();

        let stored = index.get("oai:1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Título");
        assert_eq!(stored.authors, original.authors);
        assert_eq!(stored.keywords, original.keywords);
        assert_eq!(stored.record_type.as_deref(), Some("Article"));
        assert_eq!(
            stored.date_indexed.timestamp_micros(),
            original.date_indexed.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let index = index().await;
        assert!(index.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_record_upserts_by_id() {
        let index = index().await;
        index.index_record(&record("oai:1", "Old", None)).await.unwrap();
        index.index_record(&record("oai:1", "New", None)).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.get("oai:1").await.unwrap().unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_corrupt_list_column_is_serialization_error() {
        let index = index().await;
        index.index_record(&record("oai:1", "T", None)).await.unwrap();
        sqlx::query("UPDATE records SET authors = 'not json' WHERE id = 'oai:1'")
            .execute(index.db.pool())
            .await
            .unwrap();

        let err = index.get("oai:1").await.unwrap_err();
        assert!(matches!(err, IndexError::Serialization { .. }), "got {err:?}");
    }
}
