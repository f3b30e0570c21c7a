//! Skill detection and proficiency scoring.
//!
//! Skills are matched against project paths using an injectable taxonomy of
//! keyword detectors; the scorer combines usage frequency, longevity,
//! consistency, and depth into a leveled score.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::session::SessionSummary;

/// Taxonomy category of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Language,
    Framework,
    Tool,
    Domain,
    Practice,
}

impl SkillCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::Framework => "framework",
            Self::Tool => "tool",
            Self::Domain => "domain",
            Self::Practice => "practice",
        }
    }
}

impl std::fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the skill taxonomy: detection keywords plus related skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub name: String,
    pub category: SkillCategory,
    /// Case-insensitive substrings matched against project paths.
    pub keywords: Vec<String>,
    pub related: Vec<String>,
}

impl SkillDefinition {
    fn new(
        name: &str,
        category: SkillCategory,
        keywords: &[&str],
        related: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            related: related.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    fn matches(&self, project: &str) -> bool {
        let haystack = project.to_lowercase();
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

/// The shipped taxonomy. Injectable: callers can extend or replace it
/// without touching the scoring logic.
#[must_use]
pub fn default_taxonomy() -> Vec<SkillDefinition> {
    use SkillCategory::{Domain, Framework, Language, Practice, Tool};
    vec![
        SkillDefinition::new("Rust", Language, &["rust", "-rs", "cargo"], &["CLI Tools"]),
        SkillDefinition::new(
            "TypeScript",
            Language,
            &["typescript", "-ts", "tsconfig"],
            &["React", "Node.js"],
        ),
        SkillDefinition::new("Python", Language, &["python", "-py", "django", "flask"], &[]),
        SkillDefinition::new("Go", Language, &["golang", "-go"], &[]),
        SkillDefinition::new("React", Framework, &["react", "next"], &["TypeScript"]),
        SkillDefinition::new("Node.js", Framework, &["node", "express"], &["TypeScript"]),
        SkillDefinition::new("Docker", Tool, &["docker", "compose"], &["DevOps"]),
        SkillDefinition::new("Kubernetes", Tool, &["kubernetes", "k8s", "helm"], &["DevOps", "Docker"]),
        SkillDefinition::new("Databases", Domain, &["sql", "postgres", "sqlite", "db"], &[]),
        SkillDefinition::new("DevOps", Practice, &["infra", "terraform", "ansible", "deploy"], &["Docker"]),
        SkillDefinition::new("Testing", Practice, &["test", "spec", "e2e"], &[]),
        SkillDefinition::new("CLI Tools", Domain, &["cli", "tui", "terminal"], &["Rust"]),
        SkillDefinition::new("Web APIs", Domain, &["api", "server", "backend"], &["Databases"]),
        SkillDefinition::new("Frontend", Domain, &["frontend", "web", "ui"], &["React"]),
        SkillDefinition::new("Documentation", Practice, &["docs", "wiki", "book"], &[]),
    ]
}

/// Ordinal proficiency level derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProficiencyLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl ProficiencyLevel {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Expert
        } else if score >= 60.0 {
            Self::Advanced
        } else if score >= 30.0 {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

impl std::fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived proficiency for one skill. Sessions remain the source of truth;
/// this is recomputed on demand.
#[derive(Debug, Clone)]
pub struct SkillProficiency {
    pub name: String,
    pub category: SkillCategory,
    pub level: ProficiencyLevel,
    /// Composite score in [0, 100].
    pub score: f64,
    pub usage_count: i64,
    pub first_used: NaiveDateTime,
    pub last_used: NaiveDateTime,
    pub consistency: f64,
    pub depth: f64,
    pub related: Vec<String>,
    pub next_milestone: String,
}

/// Session-count proxies for the milestone hints. Intentionally independent
/// of the composite score the level comes from.
const INTERMEDIATE_SESSIONS: i64 = 10;
const ADVANCED_SESSIONS: i64 = 50;
const EXPERT_SESSIONS: i64 = 150;

fn next_milestone(usage_count: i64) -> String {
    if usage_count < INTERMEDIATE_SESSIONS {
        format!(
            "{} more sessions to intermediate",
            INTERMEDIATE_SESSIONS - usage_count
        )
    } else if usage_count < ADVANCED_SESSIONS {
        format!("{} more sessions to advanced", ADVANCED_SESSIONS - usage_count)
    } else if usage_count < EXPERT_SESSIONS {
        format!("{} more sessions to expert", EXPERT_SESSIONS - usage_count)
    } else {
        "All session milestones reached".to_string()
    }
}

#[derive(Debug)]
struct SkillAccumulator {
    usage_count: i64,
    first_used: NaiveDateTime,
    last_used: NaiveDateTime,
    avg_prompts: f64,
}

impl SkillAccumulator {
    #[allow(clippy::cast_precision_loss)]
    fn observe(&mut self, session: &SessionSummary) {
        self.usage_count += 1;
        self.first_used = self.first_used.min(session.start);
        self.last_used = self.last_used.max(session.start);
        // Two-term running average: new value averaged with the old average.
        // Biases toward recent sessions; kept as-is.
        self.avg_prompts = (self.avg_prompts + session.prompt_count as f64) / 2.0;
    }
}

/// Scores every taxonomy skill with at least one matching session, sorted by
/// descending score.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_skills(
    sessions: &[SessionSummary],
    taxonomy: &[SkillDefinition],
    now: NaiveDateTime,
) -> Vec<SkillProficiency> {
    let mut scored = Vec::new();

    for definition in taxonomy {
        let mut acc: Option<SkillAccumulator> = None;
        for session in sessions {
            if !definition.matches(&session.project) {
                continue;
            }
            match acc.as_mut() {
                Some(acc) => acc.observe(session),
                None => {
                    acc = Some(SkillAccumulator {
                        usage_count: 1,
                        first_used: session.start,
                        last_used: session.start,
                        avg_prompts: session.prompt_count as f64,
                    });
                }
            }
        }

        let Some(acc) = acc else { continue };

        let days_since_first = (now - acc.first_used).num_days().max(0);
        let days_since_last = (now - acc.last_used).num_days().max(0);

        let usage = ((acc.usage_count as f64 + 1.0).log10() * 40.0).min(100.0);
        let time = (days_since_first as f64 / 365.0 * 50.0).min(100.0);
        let recency = (100.0 - 2.0 * days_since_last as f64).max(0.0);
        let regularity =
            (acc.usage_count as f64 / days_since_first.max(1) as f64 * 100.0).min(100.0);
        let consistency = (recency + regularity) / 2.0;
        let depth = (acc.avg_prompts / 10.0 * 100.0).min(100.0);

        let score = 0.4 * usage + 0.2 * time + 0.2 * consistency + 0.2 * depth;

        scored.push(SkillProficiency {
            name: definition.name.clone(),
            category: definition.category,
            level: ProficiencyLevel::from_score(score),
            score,
            usage_count: acc.usage_count,
            first_used: acc.first_used,
            last_used: acc.last_used,
            consistency,
            depth,
            related: definition.related.clone(),
            next_milestone: next_milestone(acc.usage_count),
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn session(project: &str, day: u32, prompts: i64) -> SessionSummary {
        SessionSummary {
            project: project.to_string(),
            start: NaiveDate::from_ymd_opt(2025, 6, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            duration_ms: 600_000,
            prompt_count: prompts,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        let def = SkillDefinition::new("Rust", SkillCategory::Language, &["rust"], &[]);
        assert!(def.matches("/home/sami/My-Rust-Project"));
        assert!(!def.matches("/home/sami/espresso"));
    }

    #[test]
    fn project_can_match_multiple_skills() {
        let sessions = vec![session("/home/sami/rust-api-server", 10, 5)];
        let scored = score_skills(&sessions, &default_taxonomy(), now());
        let names: Vec<&str> = scored.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Rust"));
        assert!(names.contains(&"Web APIs"));
    }

    #[test]
    fn unmatched_skills_are_omitted() {
        let sessions = vec![session("/home/sami/rust-thing", 10, 5)];
        let scored = score_skills(&sessions, &default_taxonomy(), now());
        assert!(scored.iter().all(|s| s.name != "Kubernetes"));
    }

    #[test]
    fn score_is_monotonic_in_usage_count() {
        // Same day, same depth: only the number of sessions varies.
        let few: Vec<SessionSummary> = (0..3).map(|_| session("/rust-app", 29, 5)).collect();
        let many: Vec<SessionSummary> = (0..30).map(|_| session("/rust-app", 29, 5)).collect();

        let taxonomy = default_taxonomy();
        let low = &score_skills(&few, &taxonomy, now())[0];
        let high = &score_skills(&many, &taxonomy, now())[0];
        assert!(high.score >= low.score, "{} < {}", high.score, low.score);
    }

    #[test]
    fn depth_uses_two_term_running_average() {
        // Prompts 2 then 10: (2 + 10) / 2 = 6, not the cumulative mean.
        let sessions = vec![session("/rust-app", 10, 2), session("/rust-app", 11, 10)];
        let scored = score_skills(&sessions, &default_taxonomy(), now());
        let rust = scored.iter().find(|s| s.name == "Rust").unwrap();
        assert!((rust.depth - 60.0).abs() < 1e-9);
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(ProficiencyLevel::from_score(85.0), ProficiencyLevel::Expert);
        assert_eq!(ProficiencyLevel::from_score(80.0), ProficiencyLevel::Expert);
        assert_eq!(ProficiencyLevel::from_score(60.0), ProficiencyLevel::Advanced);
        assert_eq!(
            ProficiencyLevel::from_score(30.0),
            ProficiencyLevel::Intermediate
        );
        assert_eq!(ProficiencyLevel::from_score(29.9), ProficiencyLevel::Beginner);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(ProficiencyLevel::Expert > ProficiencyLevel::Advanced);
        assert!(ProficiencyLevel::Advanced > ProficiencyLevel::Intermediate);
        assert!(ProficiencyLevel::Intermediate > ProficiencyLevel::Beginner);
    }

    #[test]
    fn milestone_hint_uses_session_count_proxies() {
        assert_eq!(next_milestone(4), "6 more sessions to intermediate");
        assert_eq!(next_milestone(10), "40 more sessions to advanced");
        assert_eq!(next_milestone(149), "1 more sessions to expert");
        assert_eq!(next_milestone(200), "All session milestones reached");
    }

    #[test]
    fn results_sorted_by_score_descending() {
        let sessions = vec![
            session("/rust-app", 10, 8),
            session("/rust-app", 11, 8),
            session("/rust-app", 12, 8),
            session("/docs-site", 13, 2),
        ];
        let scored = score_skills(&sessions, &default_taxonomy(), now());
        for pair in scored.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn first_and_last_used_span_matching_sessions() {
        let sessions = vec![session("/rust-app", 5, 5), session("/rust-app", 20, 5)];
        let scored = score_skills(&sessions, &default_taxonomy(), now());
        let rust = scored.iter().find(|s| s.name == "Rust").unwrap();
        assert_eq!(rust.first_used.date(), NaiveDate::from_ymd_opt(2025, 6, 5).unwrap());
        assert_eq!(rust.last_used.date(), NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());
        assert_eq!(rust.usage_count, 2);
    }
}
