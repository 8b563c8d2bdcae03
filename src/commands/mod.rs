//! CLI command handlers.

mod harvest;
mod search;
mod stats;
mod state;

pub use harvest::run_harvest_command;
pub use search::run_search_command;
pub use stats::run_stats_command;
pub use state::run_state_command;
