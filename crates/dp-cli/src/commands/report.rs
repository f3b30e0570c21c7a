//! Activity summaries for `dp today`, `dp week`, and `dp month`.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

use dp_db::Database;

use super::util::{format_duration, progress_bar, project_label};
use crate::SortKey;

/// Reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Week,
    Month,
}

impl Period {
    const fn label(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "this week",
            Self::Month => "this month",
        }
    }
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc(local_date: NaiveDate) -> DateTime<Utc> {
    let midnight = local_date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // DST spring-forward gap at midnight; 1am local always exists
            let one_am = local_date.and_time(NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN));
            match Local.from_local_datetime(&one_am) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => Utc::now(),
            }
        }
    }
}

/// Start of the window in UTC, using the local calendar.
fn period_start(period: Period, today: NaiveDate) -> DateTime<Utc> {
    let date = match period {
        Period::Today => today,
        Period::Week => {
            let offset = i64::from(today.weekday().num_days_from_monday());
            today - chrono::Duration::days(offset)
        }
        Period::Month => today.with_day(1).unwrap_or(today),
    };
    local_midnight_to_utc(date)
}

#[derive(Debug, Default)]
struct ProjectLine {
    sessions: i64,
    prompts: i64,
    duration_ms: i64,
}

pub fn run(db: &Database, period: Period, limit: usize, sort: SortKey) -> Result<()> {
    let start = period_start(period, Local::now().date_naive());
    let sessions = db.sessions_since(start)?;

    if sessions.is_empty() {
        println!("No activity {}.", period.label());
        println!();
        println!("Hint: run 'dp sync' to import new events.");
        return Ok(());
    }

    let mut by_project: HashMap<&str, ProjectLine> = HashMap::new();
    for session in &sessions {
        let line = by_project.entry(session.project_path.as_str()).or_default();
        line.sessions += 1;
        line.prompts += session.prompt_count;
        line.duration_ms += session.duration_ms;
    }

    let total_sessions = sessions.len();
    let total_prompts: i64 = sessions.iter().map(|s| s.prompt_count).sum();
    let total_duration: i64 = sessions.iter().map(|s| s.duration_ms).sum();

    println!(
        "ACTIVITY {}: {} sessions, {} prompts, {}",
        period.label().to_uppercase(),
        total_sessions,
        total_prompts,
        format_duration(total_duration)
    );
    println!();

    let mut lines: Vec<(&str, ProjectLine)> = by_project.into_iter().collect();
    lines.sort_by(|(path_a, a), (path_b, b)| {
        let key = match sort {
            SortKey::Duration => b.duration_ms.cmp(&a.duration_ms),
            SortKey::Prompts => b.prompts.cmp(&a.prompts),
            SortKey::Sessions => b.sessions.cmp(&a.sessions),
        };
        key.then_with(|| path_a.cmp(path_b))
    });

    let max_duration = lines.iter().map(|(_, l)| l.duration_ms).max().unwrap_or(0);
    for (path, line) in lines.iter().take(limit) {
        println!(
            "  {:<24} {} {:>8}  {:>3} sessions  {:>4} prompts",
            project_label(path),
            progress_bar(line.duration_ms, max_duration),
            format_duration(line.duration_ms),
            line.sessions,
            line.prompts,
        );
    }
    if lines.len() > limit {
        println!("  ... and {} more projects", lines.len() - limit);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_starts_on_monday() {
        // 2025-06-26 is a Thursday.
        let thursday = NaiveDate::from_ymd_opt(2025, 6, 26).unwrap();
        let start = period_start(Period::Week, thursday);
        let local_start = start.with_timezone(&Local).date_naive();
        assert_eq!(local_start, NaiveDate::from_ymd_opt(2025, 6, 23).unwrap());
        assert_eq!(local_start.weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn month_starts_on_the_first() {
        let mid_month = NaiveDate::from_ymd_opt(2025, 6, 26).unwrap();
        let start = period_start(Period::Month, mid_month);
        let local_start = start.with_timezone(&Local).date_naive();
        assert_eq!(local_start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }
}
