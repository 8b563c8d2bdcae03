//! Harvester Core Library
//!
//! Incremental harvesting of Dublin Core metadata from OAI-PMH repositories
//! into a shared record schema, with per-source watermarks so later runs
//! only fetch new material.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`xml`] - Namespace-aware XML decoding with an explicit recovery mode
//! - [`oai`] - `ListRecords` client with resumption-token pagination
//! - [`mapper`] - Dublin Core to [`CanonicalRecord`] mapping
//! - [`state`] - Per-source harvest watermarks
//! - [`index`] - Record index trait and its SQLite implementation
//! - [`connector`] - Per-source harvest orchestration
//! - [`config`] - TOML source registry
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connector;
pub mod db;
pub mod index;
pub mod mapper;
pub mod oai;
pub mod record;
pub mod state;
mod user_agent;
pub mod xml;

// Re-export commonly used types
pub use config::{ConfigError, HarvesterConfig, SourceConfig};
pub use connector::{HarvestError, HarvestErrorKind, HarvestMode, HarvestReport, SourceConnector};
pub use db::{Database, DbError};
pub use index::{IndexError, RecordIndex, SearchQuery, SqliteRecordIndex};
pub use mapper::{DcElement, DublinCoreFields, SourceContext, map_dublin_core};
pub use oai::{HarvestedRecord, HttpTimeouts, ListRecordsParams, OaiClient, OaiError, RecordPages};
pub use record::{CanonicalRecord, PLACEHOLDER_TITLE};
pub use state::{HarvestState, HarvestStateStore, StateError};
pub use xml::{ParseMode, ParsedDocument, XmlElement, XmlError};
