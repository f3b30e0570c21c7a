//! Shared utilities for CLI commands.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

use dp_core::SessionSummary;
use dp_db::SessionRow;

/// Formats milliseconds as a duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" otherwise.
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Formats a dollar cost with two decimal places.
pub fn format_cost(cost: f64) -> String {
    format!("${cost:.2}")
}

/// Generates a 10-character progress bar.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 {
        return "░░░░░░░░░░".to_string();
    }
    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().min(10.0) as usize
    };
    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

/// Shortens a project path to its final component for display.
pub fn project_label(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
}

/// Converts a stored UTC timestamp to local wall-clock time.
pub fn to_local_naive(timestamp: DateTime<Utc>) -> NaiveDateTime {
    timestamp.with_timezone(&Local).naive_local()
}

/// Converts stored sessions into the local-time summaries the analytics
/// functions operate on. Rows with unparseable timestamps are skipped with a
/// warning.
pub fn session_summaries(rows: &[SessionRow]) -> Vec<SessionSummary> {
    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        match dp_db::parse_timestamp(&row.start_time, &row.id) {
            Ok(start) => summaries.push(SessionSummary {
                project: row.project_path.clone(),
                start: to_local_naive(start),
                duration_ms: row.duration_ms,
                prompt_count: row.prompt_count,
            }),
            Err(err) => {
                tracing::warn!(session = %row.id, error = %err, "skipping session with bad timestamp");
            }
        }
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_switches_units_at_one_hour() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(59 * 60_000), "59m");
        assert_eq!(format_duration(90 * 60_000), "1h 30m");
        assert_eq!(format_duration(-5), "0m");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0, 0), "░░░░░░░░░░");
        assert_eq!(progress_bar(10, 10), "██████████");
        assert_eq!(progress_bar(5, 10), "█████░░░░░");
        // Tiny but non-zero values stay visible.
        assert_eq!(progress_bar(1, 1000), "█░░░░░░░░░");
    }

    #[test]
    fn project_label_keeps_final_component() {
        assert_eq!(project_label("/home/sami/dev/devpulse"), "devpulse");
        assert_eq!(project_label("/repo/"), "repo");
        assert_eq!(project_label("plain"), "plain");
    }
}
