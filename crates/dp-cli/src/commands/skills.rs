//! Implementation of the `dp skills` command.

use anyhow::Result;
use chrono::Local;

use dp_core::skills::{default_taxonomy, score_skills};
use dp_db::Database;

use super::util::session_summaries;

pub fn run(db: &Database, limit: usize) -> Result<()> {
    let rows = db.list_sessions()?;
    let sessions = session_summaries(&rows);

    if sessions.is_empty() {
        println!("No sessions recorded yet. Run 'dp sync' first.");
        return Ok(());
    }

    let scored = score_skills(&sessions, &default_taxonomy(), Local::now().naive_local());
    if scored.is_empty() {
        println!("No skills matched your project paths yet.");
        return Ok(());
    }

    println!("SKILLS");
    println!();
    println!(
        "  {:<16} {:<10} {:<13} {:>6} {:>9}",
        "SKILL", "CATEGORY", "LEVEL", "SCORE", "SESSIONS"
    );
    for skill in scored.iter().take(limit) {
        println!(
            "  {:<16} {:<10} {:<13} {:>6.1} {:>9}",
            skill.name,
            skill.category.as_str(),
            skill.level.as_str(),
            skill.score,
            skill.usage_count,
        );
    }
    if scored.len() > limit {
        println!("  ... and {} more skills", scored.len() - limit);
    }

    println!();
    if let Some(top) = scored.first() {
        println!("  Next up for {}: {}", top.name, top.next_milestone);
    }

    Ok(())
}
