//! Usage analytics CLI library.
//!
//! This crate provides the `dp` command-line interface.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, ExportDataset, ExportFormat, SortKey};
pub use config::Config;
