//! Stats command handler: aggregate counts over the record index.

use anyhow::Result;
use harvester_core::{Database, SqliteRecordIndex};

pub async fn run_stats_command(db: &Database) -> Result<()> {
    let index = SqliteRecordIndex::new(db.clone());

    println!("total = {}", index.count().await?);

    println!("\nby repository:");
    for row in index.stats_by_repository().await? {
        println!("  {:>8}  {}", row.count, row.repository);
    }

    println!("\nby type:");
    for row in index.stats_by_type().await? {
        println!(
            "  {:>8}  {}",
            row.count,
            row.record_type.as_deref().unwrap_or("(none)")
        );
    }

    println!("\nby year:");
    for row in index.stats_by_year().await? {
        println!("  {:>8}  {}", row.count, row.year);
    }
    Ok(())
}
