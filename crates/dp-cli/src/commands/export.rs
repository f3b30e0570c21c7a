//! Implementation of the `dp export` command.
//!
//! Writes one of the stored datasets to a CSV or JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use dp_db::Database;

use crate::{ExportDataset, ExportFormat};

pub fn run(
    db: &Database,
    dataset: ExportDataset,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    let (content, rows) = match dataset {
        ExportDataset::Sessions => render(db.list_sessions()?, format, session_csv_row, SESSION_HEADER)?,
        ExportDataset::Projects => render(db.list_projects()?, format, project_csv_row, PROJECT_HEADER)?,
        ExportDataset::Prompts => render(db.list_prompts()?, format, prompt_csv_row, PROMPT_HEADER)?,
        ExportDataset::Daily => render(db.daily_activity(epoch)?, format, daily_csv_row, DAILY_HEADER)?,
    };

    let path = output.map_or_else(|| default_output_path(dataset, format), Path::to_path_buf);
    fs::write(&path, content)
        .with_context(|| format!("failed to write export to {}", path.display()))?;
    println!("Exported {} {} rows to {}", rows, dataset.as_str(), path.display());
    Ok(())
}

fn default_output_path(dataset: ExportDataset, format: ExportFormat) -> PathBuf {
    let date = Local::now().format("%Y%m%d");
    PathBuf::from(format!(
        "devpulse-{}-{date}.{}",
        dataset.as_str(),
        format.extension()
    ))
}

fn render<T: Serialize>(
    rows: Vec<T>,
    format: ExportFormat,
    to_csv_row: fn(&T) -> Vec<String>,
    header: &[&str],
) -> Result<(String, usize)> {
    let count = rows.len();
    let content = match format {
        ExportFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(&rows).context("failed to serialize export")?;
            json.push('\n');
            json
        }
        ExportFormat::Csv => {
            let mut out = String::new();
            out.push_str(&csv_line(header.iter().map(ToString::to_string).collect()));
            for row in &rows {
                out.push_str(&csv_line(to_csv_row(row)));
            }
            out
        }
    };
    Ok((content, count))
}

/// Joins fields with commas, quoting any field containing a comma, quote, or
/// newline (quotes doubled).
fn csv_line(fields: Vec<String>) -> String {
    let escaped: Vec<String> = fields
        .into_iter()
        .map(|field| {
            if field.contains(',') || field.contains('"') || field.contains('\n') {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field
            }
        })
        .collect();
    let mut line = escaped.join(",");
    line.push('\n');
    line
}

const SESSION_HEADER: &[&str] = &[
    "id",
    "project_path",
    "start_time",
    "end_time",
    "prompt_count",
    "duration_ms",
    "first_prompt",
    "last_prompt",
];

fn session_csv_row(row: &dp_db::SessionRow) -> Vec<String> {
    vec![
        row.id.clone(),
        row.project_path.clone(),
        row.start_time.clone(),
        row.end_time.clone(),
        row.prompt_count.to_string(),
        row.duration_ms.to_string(),
        row.first_prompt.clone(),
        row.last_prompt.clone(),
    ]
}

const PROJECT_HEADER: &[&str] = &[
    "path",
    "first_seen",
    "last_active",
    "prompt_count",
    "session_count",
    "duration_ms",
    "lines_added",
    "lines_removed",
    "total_cost",
    "input_tokens",
    "output_tokens",
    "cache_creation_tokens",
    "cache_read_tokens",
];

fn project_csv_row(row: &dp_db::ProjectRow) -> Vec<String> {
    vec![
        row.path.clone(),
        row.first_seen.clone(),
        row.last_active.clone(),
        row.prompt_count.to_string(),
        row.session_count.to_string(),
        row.duration_ms.to_string(),
        row.lines_added.to_string(),
        row.lines_removed.to_string(),
        format!("{:.6}", row.total_cost),
        row.input_tokens.to_string(),
        row.output_tokens.to_string(),
        row.cache_creation_tokens.to_string(),
        row.cache_read_tokens.to_string(),
    ]
}

const PROMPT_HEADER: &[&str] = &["id", "session_id", "project_path", "timestamp", "content"];

fn prompt_csv_row(row: &dp_db::PromptRow) -> Vec<String> {
    vec![
        row.id.clone(),
        row.session_id.clone(),
        row.project_path.clone(),
        row.timestamp.clone(),
        row.content.clone(),
    ]
}

const DAILY_HEADER: &[&str] = &["date", "sessions", "prompts"];

fn daily_csv_row(row: &dp_db::DailyActivity) -> Vec<String> {
    vec![
        row.date.clone(),
        row.sessions.to_string(),
        row.prompts.to_string(),
    ]
}
