//! Implementation of the `dp heatmap` command.
//!
//! Renders a day-of-week by hour-of-day terminal grid of session starts over
//! a trailing window, in local time.

use anyhow::Result;
use chrono::{Datelike, Duration, Timelike, Utc};

use dp_db::Database;

use super::util::session_summaries;

const SHADES: [char; 5] = ['·', '░', '▒', '▓', '█'];

fn shade(count: i64, max: i64) -> char {
    if count == 0 || max == 0 {
        return SHADES[0];
    }
    // Four intensity buckets over (0, max]
    // `i64::div_ceil` is unstable; both operands are positive past the guard.
    let bucket = ((count * 4 + max - 1) / max).clamp(1, 4);
    SHADES[usize::try_from(bucket).unwrap_or(4)]
}

#[allow(clippy::cast_possible_truncation)]
pub fn run(db: &Database, days: u32) -> Result<()> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let rows = db.sessions_since(cutoff)?;
    let sessions = session_summaries(&rows);

    if sessions.is_empty() {
        println!("No sessions in the last {days} days.");
        return Ok(());
    }

    // grid[weekday][hour], Monday first
    let mut grid = [[0_i64; 24]; 7];
    for session in &sessions {
        let day = session.start.weekday().num_days_from_monday() as usize;
        let hour = session.start.hour() as usize;
        grid[day][hour] += 1;
    }
    let max = grid.iter().flatten().copied().max().unwrap_or(0);

    println!("ACTIVITY HEATMAP (last {days} days, local time)");
    println!();
    print!("      ");
    for hour in 0..24 {
        if hour % 3 == 0 {
            print!("{hour:<3}");
        }
    }
    println!();

    const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for (day, counts) in grid.iter().enumerate() {
        print!("  {} ", DAY_NAMES[day]);
        for count in counts {
            print!("{}", shade(*count, max));
        }
        println!();
    }

    println!();
    println!("  {} = none, {} = busiest ({} sessions)", SHADES[0], SHADES[4], max);

    Ok(())
}
