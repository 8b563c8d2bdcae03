//! Harvester configuration loaded from TOML.
//!
//! ```toml
//! database_path = "harvest.db"
//! tolerant_xml = true
//!
//! [http]
//! connect_timeout_secs = 10
//! read_timeout_secs = 30
//!
//! [[sources]]
//! id = "omeka_uh"
//! base_url = "https://accesoabierto.uh.cu/s/scriptorium/oai"
//! set_spec = "2161263"
//! institution = "Universidad de La Habana"
//! repository = "Omeka UH Scriptorium"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::mapper::SourceContext;
use crate::oai::{HttpTimeouts, ListRecordsParams};
use crate::xml::ParseMode;

/// Default metadata prefix.
pub const DEFAULT_METADATA_PREFIX: &str = "oai_dc";

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "harvest.db";

/// Allowed range for either HTTP timeout, in seconds.
const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=3600;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// One OAI-PMH source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier; keys the harvest watermark.
    pub id: String,
    pub base_url: String,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    #[serde(default)]
    pub set_spec: Option<String>,
    pub institution: String,
    /// Label stamped on every record as its repository.
    pub repository: String,
}

impl SourceConfig {
    /// Initial `ListRecords` arguments for this source (no date bounds).
    #[must_use]
    pub fn list_records_params(&self) -> ListRecordsParams {
        let params = ListRecordsParams::new(&self.metadata_prefix);
        match self.set_spec.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(set_spec) => params.with_set(set_spec),
            None => params,
        }
    }

    /// Context the mapper stamps on this source's records.
    #[must_use]
    pub fn context(&self) -> SourceContext {
        SourceContext::new(&self.institution, &self.repository)
    }
}

fn default_metadata_prefix() -> String {
    DEFAULT_METADATA_PREFIX.to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_tolerant_xml() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HarvesterConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Decode responses in recovery mode.
    #[serde(default = "default_tolerant_xml")]
    pub tolerant_xml: bool,
    #[serde(default)]
    pub http: HttpTimeouts,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl HarvesterConfig {
    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), sources = config.sources.len(), "loaded configuration");
        Ok(config)
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Validation`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks ids, URLs and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("http.connect_timeout_secs", self.http.connect_timeout_secs),
            ("http.read_timeout_secs", self.http.read_timeout_secs),
        ] {
            if !TIMEOUT_RANGE_SECS.contains(&value) {
                return Err(ConfigError::validation(format!(
                    "{name} must be between 1 and 3600 (got {value})"
                )));
            }
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::validation("source id must not be empty"));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::validation(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
            if source.metadata_prefix.trim().is_empty() {
                return Err(ConfigError::validation(format!(
                    "source '{}': metadata_prefix must not be empty",
                    source.id
                )));
            }
            match url::Url::parse(source.base_url.trim()) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => {
                    return Err(ConfigError::validation(format!(
                        "source '{}': base_url scheme must be http or https (got {})",
                        source.id,
                        url.scheme()
                    )));
                }
                Err(e) => {
                    return Err(ConfigError::validation(format!(
                        "source '{}': invalid base_url '{}': {e}",
                        source.id, source.base_url
                    )));
                }
            }
        }
        Ok(())
    }

    /// Looks up a source by id.
    #[must_use]
    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.id == id)
    }

    /// Decoder mode selected by `tolerant_xml`.
    #[must_use]
    pub fn parse_mode(&self) -> ParseMode {
        ParseMode::from_tolerant(self.tolerant_xml)
    }
}
