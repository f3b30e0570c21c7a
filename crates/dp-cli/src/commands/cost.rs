//! Implementation of the `dp cost` command.

use anyhow::Result;
use chrono::{Duration, Utc};

use dp_db::{Database, format_timestamp};

use super::util::{format_cost, project_label};

pub fn run(db: &Database, days: u32, limit: usize, min_cost: f64) -> Result<()> {
    let cutoff = format_timestamp(Utc::now() - Duration::days(i64::from(days)));
    let projects: Vec<_> = db
        .list_projects()?
        .into_iter()
        .filter(|p| p.last_active >= cutoff && p.total_cost >= min_cost)
        .collect();

    if projects.is_empty() {
        println!("No project spend recorded in the last {days} days.");
        return Ok(());
    }

    let total_cost: f64 = projects.iter().map(|p| p.total_cost).sum();
    let total_input: i64 = projects.iter().map(|p| p.input_tokens).sum();
    let total_output: i64 = projects.iter().map(|p| p.output_tokens).sum();

    println!("COST (last {days} days)");
    println!();
    println!(
        "  {:<24} {:>9} {:>12} {:>12} {:>9}",
        "PROJECT", "COST", "INPUT TOK", "OUTPUT TOK", "SESSIONS"
    );

    // list_projects is ordered by recency; spend order reads better here
    let mut projects = projects;
    projects.sort_by(|a, b| {
        b.total_cost
            .partial_cmp(&a.total_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for project in projects.iter().take(limit) {
        println!(
            "  {:<24} {:>9} {:>12} {:>12} {:>9}",
            project_label(&project.path),
            format_cost(project.total_cost),
            project.input_tokens,
            project.output_tokens,
            project.session_count,
        );
    }
    if projects.len() > limit {
        println!("  ... and {} more projects", projects.len() - limit);
    }

    println!();
    println!(
        "  Total: {} across {} projects ({} input / {} output tokens)",
        format_cost(total_cost),
        projects.len(),
        total_input,
        total_output
    );

    Ok(())
}
