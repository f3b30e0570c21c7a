//! Achievement rules: pure functions from aggregate state to unlockable
//! milestones.
//!
//! Every rule family is evaluated independently; persistence and
//! already-unlocked filtering are the caller's concern.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::skills::{ProficiencyLevel, SkillProficiency};

/// Category tag for an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Streak,
    Skill,
    Cost,
    Productivity,
    Calendar,
}

impl AchievementCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Streak => "streak",
            Self::Skill => "skill",
            Self::Cost => "cost",
            Self::Productivity => "productivity",
            Self::Calendar => "calendar",
        }
    }
}

impl std::fmt::Display for AchievementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AchievementCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streak" => Ok(Self::Streak),
            "skill" => Ok(Self::Skill),
            "cost" => Ok(Self::Cost),
            "productivity" => Ok(Self::Productivity),
            "calendar" => Ok(Self::Calendar),
            _ => Err(format!("invalid achievement category: {s}")),
        }
    }
}

/// A discrete, idempotent unlock. An id, once persisted, is never re-emitted
/// as new.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub category: AchievementCategory,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Aggregate state the rules are evaluated against.
#[derive(Debug, Clone, Default)]
pub struct AchievementInput<'a> {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub skills: &'a [SkillProficiency],
    pub cache_read_tokens: i64,
    pub cache_creation_tokens: i64,
    pub total_sessions: i64,
    pub total_prompts: i64,
    /// Days since the very first recorded session, if any.
    pub days_since_first: Option<i64>,
    pub weekend_sessions: i64,
}

const STREAK_DAYS: [i64; 8] = [3, 7, 14, 30, 60, 90, 180, 365];
const SESSION_LADDER: [i64; 6] = [10, 50, 100, 250, 500, 1000];
const PROMPT_LADDER: [i64; 5] = [100, 500, 1000, 5000, 10_000];
const CALENDAR_DAYS: [i64; 5] = [7, 30, 90, 180, 365];
const WEEKEND_SESSION_TARGET: i64 = 10;

/// Cache hit ratio as a percentage, or `None` when no cache traffic exists.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cache_hit_ratio(cache_read_tokens: i64, cache_creation_tokens: i64) -> Option<f64> {
    let total = cache_read_tokens + cache_creation_tokens;
    if total <= 0 {
        return None;
    }
    Some(cache_read_tokens as f64 / total as f64 * 100.0)
}

fn skill_slug(name: &str) -> String {
    name.to_lowercase().replace([' ', '.', '/'], "-")
}

fn achievement(
    id: String,
    category: AchievementCategory,
    title: String,
    description: String,
    icon: &str,
    now: DateTime<Utc>,
) -> Achievement {
    Achievement {
        id,
        category,
        title,
        description,
        icon: icon.to_string(),
        unlocked_at: now,
        metadata: None,
    }
}

fn streak_achievements(input: &AchievementInput<'_>, now: DateTime<Utc>) -> Vec<Achievement> {
    STREAK_DAYS
        .iter()
        .filter(|days| input.longest_streak >= **days)
        .map(|days| {
            achievement(
                format!("streak-{days}"),
                AchievementCategory::Streak,
                format!("{days}-Day Streak"),
                format!("Coded with the assistant {days} days in a row"),
                "🔥",
                now,
            )
        })
        .collect()
}

fn skill_achievements(input: &AchievementInput<'_>, now: DateTime<Utc>) -> Vec<Achievement> {
    let mut unlocks = Vec::new();
    for skill in input.skills {
        let slug = skill_slug(&skill.name);
        if skill.level >= ProficiencyLevel::Advanced {
            unlocks.push(achievement(
                format!("skill-{slug}-advanced"),
                AchievementCategory::Skill,
                format!("{} Adept", skill.name),
                format!("Reached advanced proficiency in {}", skill.name),
                "🎯",
                now,
            ));
        }
        if skill.level >= ProficiencyLevel::Expert {
            unlocks.push(achievement(
                format!("skill-{slug}-expert"),
                AchievementCategory::Skill,
                format!("{} Expert", skill.name),
                format!("Reached expert proficiency in {}", skill.name),
                "🏆",
                now,
            ));
        }
    }
    unlocks
}

/// Both tiers are evaluated independently: a ≥90% ratio also satisfies the
/// ≥80% rule, and both fire.
fn cost_achievements(input: &AchievementInput<'_>, now: DateTime<Utc>) -> Vec<Achievement> {
    let Some(ratio) = cache_hit_ratio(input.cache_read_tokens, input.cache_creation_tokens) else {
        return Vec::new();
    };

    let mut unlocks = Vec::new();
    if ratio >= 80.0 {
        unlocks.push(achievement(
            "cache-hit-80".to_string(),
            AchievementCategory::Cost,
            "Cache Friendly".to_string(),
            "Kept the prompt cache hit ratio at 80% or better".to_string(),
            "💰",
            now,
        ));
    }
    if ratio >= 90.0 {
        unlocks.push(achievement(
            "cache-hit-90".to_string(),
            AchievementCategory::Cost,
            "Cache Master".to_string(),
            "Kept the prompt cache hit ratio at 90% or better".to_string(),
            "💎",
            now,
        ));
    }
    unlocks
}

fn productivity_achievements(input: &AchievementInput<'_>, now: DateTime<Utc>) -> Vec<Achievement> {
    let mut unlocks = Vec::new();
    for threshold in SESSION_LADDER {
        if input.total_sessions >= threshold {
            unlocks.push(achievement(
                format!("sessions-{threshold}"),
                AchievementCategory::Productivity,
                format!("{threshold} Sessions"),
                format!("Completed {threshold} coding sessions"),
                "📈",
                now,
            ));
        }
    }
    for threshold in PROMPT_LADDER {
        if input.total_prompts >= threshold {
            unlocks.push(achievement(
                format!("prompts-{threshold}"),
                AchievementCategory::Productivity,
                format!("{threshold} Prompts"),
                format!("Sent {threshold} prompts"),
                "⚡",
                now,
            ));
        }
    }
    unlocks
}

fn calendar_achievements(input: &AchievementInput<'_>, now: DateTime<Utc>) -> Vec<Achievement> {
    let mut unlocks = Vec::new();
    if let Some(days) = input.days_since_first {
        for threshold in CALENDAR_DAYS {
            if days >= threshold {
                unlocks.push(achievement(
                    format!("days-{threshold}"),
                    AchievementCategory::Calendar,
                    format!("{threshold} Days In"),
                    format!("{threshold} days since your first session"),
                    "📅",
                    now,
                ));
            }
        }
    }
    if input.weekend_sessions >= WEEKEND_SESSION_TARGET {
        unlocks.push(achievement(
            format!("weekend-sessions-{WEEKEND_SESSION_TARGET}"),
            AchievementCategory::Calendar,
            "Weekend Regular".to_string(),
            format!("Logged {WEEKEND_SESSION_TARGET}+ weekend sessions"),
            "🌙",
            now,
        ));
    }
    unlocks
}

/// Evaluates every rule family and returns all currently satisfied
/// achievements.
#[must_use]
pub fn evaluate(input: &AchievementInput<'_>, now: DateTime<Utc>) -> Vec<Achievement> {
    let mut unlocks = streak_achievements(input, now);
    unlocks.extend(skill_achievements(input, now));
    unlocks.extend(cost_achievements(input, now));
    unlocks.extend(productivity_achievements(input, now));
    unlocks.extend(calendar_achievements(input, now));
    unlocks
}

/// Satisfied achievements whose ids are not already unlocked. Callers persist
/// the result; re-persisting an unlocked id is a safe no-op.
#[must_use]
pub fn new_achievements(
    input: &AchievementInput<'_>,
    unlocked: &HashSet<String>,
    now: DateTime<Utc>,
) -> Vec<Achievement> {
    evaluate(input, now)
        .into_iter()
        .filter(|a| !unlocked.contains(&a.id))
        .collect()
}
