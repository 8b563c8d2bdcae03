//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "harvester.toml";

/// Incremental OAI-PMH harvester.
///
/// Harvests Dublin Core records from the configured repositories into a
/// local SQLite index and tracks a per-source watermark so later runs only
/// fetch new material.
#[derive(Parser, Debug)]
#[command(name = "oai-harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override the database path from the configuration
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Harvest one or more configured sources
    Harvest {
        /// Source ids to harvest
        #[arg(required_unless_present = "all")]
        sources: Vec<String>,

        /// Harvest every configured source
        #[arg(long, conflicts_with = "sources")]
        all: bool,

        /// Only fetch records changed since the last successful harvest
        #[arg(short, long)]
        incremental: bool,
    },

    /// Search indexed records by title, abstract, authors or keywords
    Search {
        /// Text to look for
        query: String,

        /// Maximum number of results (1-1000)
        #[arg(short = 'n', long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=1000))]
        limit: u32,

        /// Only records of this type
        #[arg(long = "type")]
        record_type: Option<String>,

        /// Only records from this repository label
        #[arg(long)]
        repository: Option<String>,

        /// Earliest issued year
        #[arg(long)]
        year_from: Option<i32>,

        /// Latest issued year
        #[arg(long)]
        year_to: Option<i32>,
    },

    /// Show record counts per repository, type and year
    Stats,

    /// Show the stored harvest watermark of every source
    State,
}
