use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dp_cli::commands::{cost, export, habits, heatmap, optimize, report, skills, sync};
use dp_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(dp_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = dp_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init avoids a panic when tracing is already set up (e.g. in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Sync) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            sync::run(&mut db, &config)?;
        }
        Some(Commands::Today { limit, sort }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            report::run(&db, report::Period::Today, *limit, *sort)?;
        }
        Some(Commands::Week { limit, sort }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            report::run(&db, report::Period::Week, *limit, *sort)?;
        }
        Some(Commands::Month { limit, sort }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            report::run(&db, report::Period::Month, *limit, *sort)?;
        }
        Some(Commands::Cost {
            days,
            limit,
            min_cost,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            cost::run(&db, *days, *limit, *min_cost)?;
        }
        Some(Commands::Optimize) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            optimize::run(&db)?;
        }
        Some(Commands::Heatmap { days }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            heatmap::run(&db, *days)?;
        }
        Some(Commands::Habits) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            habits::run(&db)?;
        }
        Some(Commands::Skills { limit }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            skills::run(&db, *limit)?;
        }
        Some(Commands::Export {
            dataset,
            format,
            output,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            export::run(&db, *dataset, *format, output.as_deref())?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
