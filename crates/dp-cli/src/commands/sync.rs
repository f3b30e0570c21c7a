//! Implementation of the `dp sync` command.
//!
//! Runs the incremental import, then re-evaluates achievements against the
//! updated database and fires the webhook when anything new unlocked.

use anyhow::Result;
use chrono::{Datelike, Duration, Local, Utc, Weekday};

use dp_core::achievements::{Achievement, AchievementCategory, AchievementInput, new_achievements};
use dp_core::patterns::{STREAK_WINDOW_DAYS, compute_streaks};
use dp_core::skills::{default_taxonomy, score_skills};
use dp_db::{AchievementRow, Database, format_timestamp};
use dp_notify::{Notification, NotifyConfig};

use super::util::session_summaries;

pub fn run(db: &mut Database, config: &crate::Config) -> Result<()> {
    let now = Utc::now();
    let report = dp_db::sync(
        db,
        &config.event_log_path,
        &config.metrics_path,
        config.idle_gap_ms,
        now,
    )?;

    println!(
        "Processed {} events: {} new sessions, {} projects updated",
        report.events_processed, report.sessions_created, report.projects_updated
    );
    for error in &report.errors {
        tracing::warn!(%error, "sync record skipped");
    }
    if !report.errors.is_empty() {
        println!("{} records skipped (run with -v for details)", report.errors.len());
    }

    let unlocked = evaluate_achievements(db)?;
    if !unlocked.is_empty() {
        println!();
        println!("New achievements:");
        for achievement in &unlocked {
            println!("  {} {} — {}", achievement.icon, achievement.title, achievement.description);
        }
    }

    notify(&report, &unlocked);
    Ok(())
}

/// Evaluates every achievement rule against current database state and
/// persists anything newly satisfied.
#[allow(clippy::cast_possible_wrap)]
fn evaluate_achievements(db: &mut Database) -> Result<Vec<Achievement>> {
    let now = Utc::now();
    let rows = db.list_sessions()?;
    let summaries = session_summaries(&rows);

    let streak_cutoff = now - Duration::days(STREAK_WINDOW_DAYS as i64);
    let daily = db.daily_activity(streak_cutoff)?;
    let active_dates: Vec<chrono::NaiveDate> = daily
        .iter()
        .filter_map(|day| day.date.parse().ok())
        .collect();
    let streaks = compute_streaks(&active_dates, now.date_naive());

    let skills = score_skills(&summaries, &default_taxonomy(), Local::now().naive_local());

    let totals = db.totals()?;
    let weekend_sessions = summaries
        .iter()
        .filter(|s| matches!(s.start.weekday(), Weekday::Sat | Weekday::Sun))
        .count();
    let days_since_first = db
        .first_session_time()?
        .map(|first| (now - first).num_days());

    let input = AchievementInput {
        current_streak: streaks.current,
        longest_streak: streaks.longest,
        skills: &skills,
        cache_read_tokens: totals.cache_read_tokens,
        cache_creation_tokens: totals.cache_creation_tokens,
        total_sessions: totals.sessions,
        total_prompts: totals.prompts,
        days_since_first,
        weekend_sessions: weekend_sessions as i64,
    };

    let already = db.unlocked_achievement_ids()?;
    let fresh = new_achievements(&input, &already, now);
    for achievement in &fresh {
        db.insert_achievement(&AchievementRow {
            id: achievement.id.clone(),
            category: achievement.category.as_str().to_string(),
            title: achievement.title.clone(),
            description: achievement.description.clone(),
            icon: achievement.icon.clone(),
            unlocked_at: format_timestamp(achievement.unlocked_at),
            metadata: achievement
                .metadata
                .as_ref()
                .map(std::string::ToString::to_string),
        })?;
    }
    Ok(fresh)
}

/// Sends the webhook notification, honoring the per-category toggles.
/// Best-effort only; never fails the sync.
fn notify(report: &dp_db::SyncReport, unlocked: &[Achievement]) {
    let notify_config = NotifyConfig::from_env();
    if !notify_config.is_enabled() {
        return;
    }

    let announced: Vec<Achievement> = unlocked
        .iter()
        .filter(|a| match a.category {
            AchievementCategory::Streak => notify_config.streaks,
            AchievementCategory::Productivity | AchievementCategory::Calendar => {
                notify_config.milestones
            }
            AchievementCategory::Skill | AchievementCategory::Cost => notify_config.achievements,
        })
        .cloned()
        .collect();
    if report.events_processed == 0 && announced.is_empty() {
        return;
    }

    let summary = format!(
        "devpulse sync: {} events, {} new sessions",
        report.events_processed, report.sessions_created
    );
    let notification = Notification::new(summary).with_achievements(&announced);
    dp_notify::send_blocking(&notify_config, &notification);
}
