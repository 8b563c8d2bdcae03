//! State command handler: list stored harvest watermarks.

use anyhow::Result;
use harvester_core::{Database, HarvestStateStore, HarvesterConfig};

pub async fn run_state_command(config: &HarvesterConfig, db: &Database) -> Result<()> {
    let states = HarvestStateStore::new(db.clone()).list().await?;

    for source in &config.sources {
        let date = states
            .iter()
            .find(|state| state.source_id == source.id)
            .and_then(|state| state.last_harvest_date.as_deref())
            .unwrap_or("never");
        println!("{} = {date}", source.id);
    }
    // Watermarks left behind by sources since removed from the configuration.
    for state in states
        .iter()
        .filter(|state| config.source(&state.source_id).is_none())
    {
        println!(
            "{} = {} (not configured)",
            state.source_id,
            state.last_harvest_date.as_deref().unwrap_or("never")
        );
    }
    Ok(())
}
