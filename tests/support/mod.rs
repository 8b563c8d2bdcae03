//! Shared OAI-PMH fixtures for integration tests.
//!
//! Builds `ListRecords` response bodies and mounts them on a wiremock server
//! at `/oai`, matching first-page and continuation requests separately.

#![allow(dead_code)]

use std::sync::Arc;

use harvester_core::{
    Database, HarvestStateStore, HttpTimeouts, OaiClient, RecordIndex, SourceConfig,
    SourceConnector, SqliteRecordIndex,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OAI_PATH: &str = "/oai";

/// One `<record>` with the given Dublin Core fields inside `oai_dc:dc`.
pub fn record_with(identifier: &str, fields: &[(&str, &str)]) -> String {
    let dc: String = fields
        .iter()
        .map(|(name, value)| format!("<dc:{name}>{value}</dc:{name}>"))
        .collect();
    format!(
        r#"<record>
  <header><identifier>{identifier}</identifier><datestamp>2024-05-01</datestamp></header>
  <metadata>
    <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/" xmlns:dc="http://purl.org/dc/elements/1.1/">{dc}</oai_dc:dc>
  </metadata>
</record>"#
    )
}

/// One `<record>` with a title and a landing-page identifier.
pub fn record(identifier: &str, title: &str) -> String {
    let landing = format!("https://repo.example/items/{}", identifier.replace(':', "-"));
    record_with(
        identifier,
        &[("title", title), ("creator", "Autor, Uno"), ("identifier", landing.as_str())],
    )
}

/// A `<record>` whose header has no identifier.
pub fn record_without_identifier(title: &str) -> String {
    format!(
        r#"<record><header><datestamp>2024-05-01</datestamp></header><metadata>
<oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{title}</dc:title></oai_dc:dc>
</metadata></record>"#
    )
}

/// Full `ListRecords` response with an optional resumption token.
pub fn list_records_page(records: &[String], token: Option<&str>) -> String {
    let token = token
        .map(|t| format!("<resumptionToken completeListSize=\"99\">{t}</resumptionToken>"))
        .unwrap_or_else(|| "<resumptionToken completeListSize=\"99\"/>".to_string());
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2024-05-01T12:00:00Z</responseDate>
  <request verb="ListRecords">https://repo.example/oai</request>
  <ListRecords>
    {}
    {token}
  </ListRecords>
</OAI-PMH>"#,
        records.join("\n")
    )
}

/// Response carrying an explicit OAI `<error>`.
pub fn oai_error_page(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2024-05-01T12:00:00Z</responseDate>
  <request verb="ListRecords">https://repo.example/oai</request>
  <error code="{code}">{message}</error>
</OAI-PMH>"#
    )
}

pub fn xml_response(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "text/xml; charset=utf-8")
        .set_body_string(body.into())
}

/// Mounts the response for the initial request (`metadataPrefix` present).
pub async fn mount_first_page(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(OAI_PATH))
        .and(query_param("verb", "ListRecords"))
        .and(query_param("metadataPrefix", "oai_dc"))
        .and(query_param_is_missing("resumptionToken"))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts the response for a continuation request carrying `token` and
/// nothing but the verb.
pub async fn mount_token_page(server: &MockServer, token: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(OAI_PATH))
        .and(query_param("verb", "ListRecords"))
        .and(query_param("resumptionToken", token))
        .and(query_param_is_missing("metadataPrefix"))
        .and(query_param_is_missing("set"))
        .and(query_param_is_missing("from"))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn endpoint(server: &MockServer) -> String {
    format!("{}{OAI_PATH}", server.uri())
}

pub fn fast_timeouts() -> HttpTimeouts {
    HttpTimeouts {
        connect_timeout_secs: 2,
        read_timeout_secs: 2,
    }
}

pub fn client_for(server: &MockServer) -> OaiClient {
    OaiClient::new(&endpoint(server), fast_timeouts()).expect("client builds")
}

pub fn source_for(server: &MockServer, id: &str) -> SourceConfig {
    SourceConfig {
        id: id.to_string(),
        base_url: endpoint(server),
        metadata_prefix: "oai_dc".to_string(),
        set_spec: None,
        institution: "Universidad de Prueba".to_string(),
        repository: "Repositorio de Prueba".to_string(),
    }
}

/// Creates a file-backed database in a fresh temp dir.
pub async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = temp_dir.path().join("harvest.db");
    let db = Database::new(&db_path).await.expect("failed to create db");
    (db, temp_dir)
}

/// Connector wired to the mock server, the given database and the SQLite index.
pub fn connector_for(server: &MockServer, id: &str, db: &Database) -> SourceConnector {
    let index: Arc<dyn RecordIndex> = Arc::new(SqliteRecordIndex::new(db.clone()));
    SourceConnector::new(
        source_for(server, id),
        client_for(server),
        HarvestStateStore::new(db.clone()),
        index,
    )
}
