//! Harvest command handler: run configured sources one after another.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use harvester_core::{
    Database, HarvestMode, HarvestReport, HarvestStateStore, HarvesterConfig, OaiClient,
    RecordIndex, SourceConfig, SourceConnector, SqliteRecordIndex,
};
use tracing::error;

pub async fn run_harvest_command(
    config: &HarvesterConfig,
    db: &Database,
    source_ids: &[String],
    all: bool,
    incremental: bool,
) -> Result<()> {
    let selected = select_sources(config, source_ids, all)?;
    let mode = if incremental {
        HarvestMode::Incremental
    } else {
        HarvestMode::Full
    };

    let state = HarvestStateStore::new(db.clone());
    let index: Arc<dyn RecordIndex> = Arc::new(SqliteRecordIndex::new(db.clone()));

    let mut failed = Vec::new();
    for source in &selected {
        match harvest_one(config, source, mode, &state, &index).await {
            Ok(report) => println!("{}", render_report(&report)),
            Err(err) => {
                error!(source = %source.id, error = %format!("{err:#}"), "harvest failed");
                eprintln!("{}: FAILED: {err:#}", source.id);
                failed.push(source.id.as_str());
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} of {} source(s) failed: {}",
            failed.len(),
            selected.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

async fn harvest_one(
    config: &HarvesterConfig,
    source: &SourceConfig,
    mode: HarvestMode,
    state: &HarvestStateStore,
    index: &Arc<dyn RecordIndex>,
) -> Result<HarvestReport> {
    let client = OaiClient::new(&source.base_url, config.http)
        .with_context(|| format!("cannot create OAI client for source '{}'", source.id))?
        .with_parse_mode(config.parse_mode());
    let connector = SourceConnector::new(source.clone(), client, state.clone(), Arc::clone(index));
    Ok(connector.run(mode).await?)
}

fn select_sources<'a>(
    config: &'a HarvesterConfig,
    source_ids: &[String],
    all: bool,
) -> Result<Vec<&'a SourceConfig>> {
    let selected: Vec<&SourceConfig> = if all {
        config.sources.iter().collect()
    } else {
        source_ids
            .iter()
            .map(|id| {
                config.source(id).with_context(|| {
                    let known: Vec<&str> = config.sources.iter().map(|s| s.id.as_str()).collect();
                    format!("unknown source '{id}' (configured: {})", known.join(", "))
                })
            })
            .collect::<Result<_>>()?
    };
    if selected.is_empty() {
        bail!("no sources configured");
    }
    Ok(selected)
}

fn render_report(report: &HarvestReport) -> String {
    let mut line = format!(
        "{}: {} harvest indexed {} record(s) from {} page(s)",
        report.source_id, report.mode, report.harvested, report.pages
    );
    if report.truncated {
        line.push_str(" (incomplete: some records could not be read)");
    }
    line
}
