//! Implementation of the `dp habits` command.

use anyhow::Result;
use chrono::{Duration, Local, Utc};

use dp_core::patterns::{STREAK_WINDOW_DAYS, compute_streaks, detect_patterns};
use dp_db::Database;

use super::util::session_summaries;

#[allow(clippy::cast_possible_wrap)]
pub fn run(db: &Database) -> Result<()> {
    let rows = db.list_sessions()?;
    let sessions = session_summaries(&rows);

    if sessions.is_empty() {
        println!("No sessions recorded yet. Run 'dp sync' first.");
        return Ok(());
    }

    let now = Local::now().naive_local();
    let patterns = detect_patterns(&sessions, now);

    let streak_cutoff = Utc::now() - Duration::days(STREAK_WINDOW_DAYS as i64);
    let daily = db.daily_activity(streak_cutoff)?;
    let active_dates: Vec<chrono::NaiveDate> = daily
        .iter()
        .filter_map(|day| day.date.parse().ok())
        .collect();
    let streaks = compute_streaks(&active_dates, Utc::now().date_naive());

    println!("HABITS");
    println!();
    if patterns.is_empty() {
        println!("  No clear patterns yet — keep coding.");
    } else {
        for pattern in &patterns {
            println!(
                "  {:<22} {:>3.0}% confidence  {}",
                pattern.name, pattern.confidence, pattern.description
            );
        }
    }

    println!();
    println!(
        "  Streak: {} days (longest: {} days)",
        streaks.current, streaks.longest
    );

    Ok(())
}
