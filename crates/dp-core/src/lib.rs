//! Core domain logic for devpulse.
//!
//! This crate contains the fundamental types and algorithms for:
//! - Reading the prompt history log and per-project metrics snapshot
//! - Grouping raw prompt events into sessions
//! - Detecting usage habit patterns and streaks
//! - Scoring per-skill proficiency
//! - Evaluating achievement unlocks

pub mod achievements;
pub mod log;
pub mod patterns;
pub mod session;
pub mod skills;

pub use achievements::{Achievement, AchievementCategory, AchievementInput, cache_hit_ratio};
pub use log::{ProjectMetrics, PromptEvent, ReadError, read_event_log, read_project_metrics};
pub use patterns::{HabitPattern, Streaks, compute_streaks, detect_patterns};
pub use session::{DEFAULT_IDLE_GAP_MS, Session, SessionSummary, group_into_sessions};
pub use skills::{
    ProficiencyLevel, SkillCategory, SkillDefinition, SkillProficiency, default_taxonomy,
    score_skills,
};
