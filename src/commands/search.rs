//! Search command handler: query the local record index.

use anyhow::Result;
use harvester_core::{CanonicalRecord, Database, SearchQuery, SqliteRecordIndex};

pub async fn run_search_command(db: &Database, query: SearchQuery) -> Result<()> {
    let index = SqliteRecordIndex::new(db.clone());
    let records = index.search_advanced(&query).await?;

    if records.is_empty() {
        println!("No records match.");
        return Ok(());
    }
    for record in &records {
        println!("{}", render_record(record));
    }
    Ok(())
}

fn render_record(record: &CanonicalRecord) -> String {
    let mut line = format!("[{}] {}", record.repository, record.title);
    if let Some(date) = &record.date_issued {
        line.push_str(&format!(" ({date})"));
    }
    if !record.authors.is_empty() {
        line.push_str(&format!("\n    {}", record.authors.join("; ")));
    }
    line.push_str(&format!(
        "\n    {}",
        record.url_landing_page.as_deref().unwrap_or(&record.id)
    ));
    line
}
