//! CLI subcommand implementations.

pub mod cost;
pub mod export;
pub mod habits;
pub mod heatmap;
pub mod optimize;
pub mod report;
pub mod skills;
pub mod sync;
pub mod util;
