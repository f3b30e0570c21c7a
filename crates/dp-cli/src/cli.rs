//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Personal coding-assistant usage analytics.
///
/// Reads the assistant's on-disk prompt history and metrics snapshot, groups
/// prompts into sessions, and reports on habits, skills, and spend.
#[derive(Debug, Parser)]
#[command(name = "dp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import new prompt events and update sessions, projects, and
    /// achievements.
    Sync,

    /// Activity summary for today.
    Today {
        /// Maximum projects to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Sort projects by this column.
        #[arg(long, value_enum, default_value_t = SortKey::Duration)]
        sort: SortKey,
    },

    /// Activity summary for the current week (Monday start).
    Week {
        /// Maximum projects to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Sort projects by this column.
        #[arg(long, value_enum, default_value_t = SortKey::Duration)]
        sort: SortKey,
    },

    /// Activity summary for the current calendar month.
    Month {
        /// Maximum projects to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Sort projects by this column.
        #[arg(long, value_enum, default_value_t = SortKey::Duration)]
        sort: SortKey,
    },

    /// Per-project cost and token breakdown.
    Cost {
        /// Only include projects active within this many days.
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Maximum projects to show.
        #[arg(long, default_value_t = 15)]
        limit: usize,

        /// Hide projects under this cost.
        #[arg(long, default_value_t = 0.0)]
        min_cost: f64,
    },

    /// Cost-efficiency recommendations.
    Optimize,

    /// Day-of-week by hour activity grid.
    Heatmap {
        /// Window size in days.
        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Detected usage patterns and streaks.
    Habits,

    /// Per-skill proficiency scores.
    Skills {
        /// Maximum skills to show.
        #[arg(long, default_value_t = 15)]
        limit: usize,
    },

    /// Export stored data as CSV or JSON.
    Export {
        /// Which dataset to export.
        #[arg(value_enum)]
        dataset: ExportDataset,

        /// Output format.
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file; auto-named in the current directory when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Project sort column for the summary commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Duration,
    Prompts,
    Sessions,
}

/// Exportable datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportDataset {
    Sessions,
    Projects,
    Prompts,
    Daily,
}

impl ExportDataset {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Projects => "projects",
            Self::Prompts => "prompts",
            Self::Daily => "daily",
        }
    }
}

/// Export output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}
