//! Per-source harvest orchestration.
//!
//! A [`SourceConnector`] ties one configured source to the paginator, the
//! mapper, the record index and the watermark store:
//!
//! - **full** harvests run without date bounds and always advance the
//!   watermark to today once the sequence ends without a fatal error;
//! - **incremental** harvests pass the stored watermark as `from` and only
//!   advance it when at least one record arrived.
//!
//! Records are forwarded to the index one at a time as they are mapped. A
//! fatal error stops the run and leaves the watermark untouched; records
//! indexed before the failure stay indexed.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::SourceConfig;
use crate::index::{IndexError, RecordIndex};
use crate::mapper::{SourceContext, map_dublin_core};
use crate::oai::{OaiClient, OaiError};
use crate::state::{HarvestStateStore, StateError};

/// Which records a run asks the endpoint for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestMode {
    Full,
    Incremental,
}

impl HarvestMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for HarvestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub source_id: String,
    pub mode: HarvestMode,
    /// Records mapped and indexed.
    pub harvested: u64,
    /// Pages downloaded.
    pub pages: u32,
    /// True when records were lost to a failed continuation request or a
    /// partially decoded page.
    pub truncated: bool,
}

/// What failed during a run.
#[derive(Debug, Error)]
pub enum HarvestErrorKind {
    #[error(transparent)]
    Oai(#[from] OaiError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A fatal harvest failure, tagged with the source and mode.
#[derive(Debug, Error)]
#[error("{mode} harvest of source '{source_id}' failed: {kind}")]
pub struct HarvestError {
    pub source_id: String,
    pub mode: HarvestMode,
    pub kind: HarvestErrorKind,
}

/// Harvests one configured source.
pub struct SourceConnector {
    source: SourceConfig,
    context: SourceContext,
    client: OaiClient,
    state: HarvestStateStore,
    index: Arc<dyn RecordIndex>,
}

impl fmt::Debug for SourceConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConnector")
            .field("source", &self.source.id)
            .field("base_url", &self.client.base_url().as_str())
            .finish_non_exhaustive()
    }
}

impl SourceConnector {
    /// Creates a connector. `client` must point at `source.base_url`.
    #[must_use]
    pub fn new(
        source: SourceConfig,
        client: OaiClient,
        state: HarvestStateStore,
        index: Arc<dyn RecordIndex>,
    ) -> Self {
        Self {
            context: source.context(),
            source,
            client,
            state,
            index,
        }
    }

    /// The source this connector harvests.
    #[must_use]
    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    /// Runs a full harvest and returns the number of records indexed.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] on any fatal paginator, index or state failure.
    pub async fn harvest_full(&self) -> Result<u64, HarvestError> {
        self.run(HarvestMode::Full).await.map(|report| report.harvested)
    }

    /// Runs an incremental harvest and returns the number of records indexed.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] on any fatal paginator, index or state failure.
    pub async fn harvest_incremental(&self) -> Result<u64, HarvestError> {
        self.run(HarvestMode::Incremental)
            .await
            .map(|report| report.harvested)
    }

    /// Runs one harvest in the given mode.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] on any fatal paginator, index or state failure.
    #[instrument(skip(self), fields(source = %self.source.id))]
    pub async fn run(&self, mode: HarvestMode) -> Result<HarvestReport, HarvestError> {
        let fail = |kind: HarvestErrorKind| HarvestError {
            source_id: self.source.id.clone(),
            mode,
            kind,
        };

        let mut params = self.source.list_records_params();
        if mode == HarvestMode::Incremental {
            match self
                .state
                .get(&self.source.id)
                .await
                .map_err(|e| fail(e.into()))?
            {
                Some(watermark) => {
                    info!(from = %watermark, "incremental harvest from stored watermark");
                    params = params.with_from(watermark);
                }
                None => info!("no stored watermark; incremental harvest is unbounded"),
            }
        }

        let mut pages = self.client.list_records(params);
        let mut harvested: u64 = 0;
        while let Some(record) = pages.next_record().await.map_err(|e| fail(e.into()))? {
            let canonical = map_dublin_core(&record.identifier, &record.metadata, &self.context);
            self.index
                .index_record(&canonical)
                .await
                .map_err(|e| fail(e.into()))?;
            harvested += 1;
        }

        let advance = match mode {
            HarvestMode::Full => {
                if harvested == 0 {
                    warn!("full harvest returned no records; advancing watermark anyway");
                }
                true
            }
            HarvestMode::Incremental => harvested > 0,
        };
        if advance {
            self.state
                .set(&self.source.id, None)
                .await
                .map_err(|e| fail(e.into()))?;
        }

        let report = HarvestReport {
            source_id: self.source.id.clone(),
            mode,
            harvested,
            pages: pages.pages_fetched(),
            truncated: pages.soft_ended(),
        };
        if report.truncated {
            warn!(
                harvested,
                pages = report.pages,
                "harvest incomplete; some records could not be read"
            );
        }
        info!(
            harvested,
            pages = report.pages,
            watermark_advanced = advance,
            "harvest finished"
        );
        Ok(report)
    }
}
