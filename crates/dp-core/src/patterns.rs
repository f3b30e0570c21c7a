//! Statistical habit-pattern detection over stored sessions.
//!
//! All functions take an explicit `now` so tests can fix the clock. Session
//! start times are local-naive; the caller decides which timezone hour and
//! day bucketing happens in.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike, Weekday};

use crate::session::SessionSummary;

/// Trailing window for time/day/focus pattern detection.
pub const PATTERN_WINDOW_DAYS: u64 = 30;

/// Trailing window for streak computation.
pub const STREAK_WINDOW_DAYS: u64 = 90;

/// Share thresholds for the daytime windows. Night gets a lower bar because
/// its window is narrower.
const DAY_WINDOW_THRESHOLD: f64 = 0.30;
const NIGHT_WINDOW_THRESHOLD: f64 = 0.20;

const WEEKEND_SHARE_THRESHOLD: f64 = 0.35;
const WEEKDAY_SHARE_THRESHOLD: f64 = 0.60;

/// Confidence boost for the weekend bucket, compensating for its smaller
/// day-count denominator. Asymmetric with weekday reporting on purpose.
const WEEKEND_CONFIDENCE_BOOST: f64 = 1.5;

const MAX_CONFIDENCE: f64 = 95.0;

/// A detected usage habit. Ephemeral: recomputed per request.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitPattern {
    pub name: String,
    pub description: String,
    /// Number of sessions (or projects, for focus patterns) backing the
    /// pattern.
    pub frequency: i64,
    /// Confidence score in [0, 100].
    pub confidence: f64,
}

/// Current and longest consecutive-day activity runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streaks {
    pub current: i64,
    pub longest: i64,
}

fn confidence_from_share(share: f64) -> f64 {
    (share * 100.0).min(MAX_CONFIDENCE)
}

fn in_window(session: &SessionSummary, now: NaiveDateTime, window_days: u64) -> bool {
    let cutoff = now - chrono::Duration::days(i64::try_from(window_days).unwrap_or(i64::MAX));
    session.start >= cutoff && session.start <= now
}

/// Named time-of-day windows. Night wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeWindow {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeWindow {
    const ALL: [Self; 4] = [Self::Morning, Self::Afternoon, Self::Evening, Self::Night];

    fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    const fn threshold(self) -> f64 {
        match self {
            Self::Night => NIGHT_WINDOW_THRESHOLD,
            _ => DAY_WINDOW_THRESHOLD,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Morning => "Morning Person",
            Self::Afternoon => "Afternoon Focus",
            Self::Evening => "Evening Coder",
            Self::Night => "Night Owl",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Morning => "Most sessions happen between 6am and noon",
            Self::Afternoon => "Most sessions happen between noon and 5pm",
            Self::Evening => "Most sessions happen between 5pm and 10pm",
            Self::Night => "A large share of sessions happen between 10pm and 6am",
        }
    }
}

/// Time-of-day patterns over the trailing 30 days.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn detect_time_patterns(sessions: &[SessionSummary], now: NaiveDateTime) -> Vec<HabitPattern> {
    let recent: Vec<&SessionSummary> = sessions
        .iter()
        .filter(|s| in_window(s, now, PATTERN_WINDOW_DAYS))
        .collect();
    if recent.is_empty() {
        return Vec::new();
    }

    let mut counts = [0i64; 4];
    for session in &recent {
        let window = TimeWindow::from_hour(session.start.hour());
        let index = TimeWindow::ALL.iter().position(|w| *w == window).unwrap_or(0);
        counts[index] += 1;
    }

    let total = recent.len() as f64;
    let mut patterns = Vec::new();
    for (window, count) in TimeWindow::ALL.into_iter().zip(counts) {
        let share = count as f64 / total;
        if share > window.threshold() {
            patterns.push(HabitPattern {
                name: window.name().to_string(),
                description: window.description().to_string(),
                frequency: count,
                confidence: confidence_from_share(share),
            });
        }
    }
    patterns
}

/// Day-of-week patterns over the trailing 30 days.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn detect_day_patterns(sessions: &[SessionSummary], now: NaiveDateTime) -> Vec<HabitPattern> {
    let recent: Vec<&SessionSummary> = sessions
        .iter()
        .filter(|s| in_window(s, now, PATTERN_WINDOW_DAYS))
        .collect();
    if recent.is_empty() {
        return Vec::new();
    }

    let weekend = recent
        .iter()
        .filter(|s| is_weekend(s.start.weekday()))
        .count() as i64;
    let total = recent.len() as i64;
    let weekday = total - weekend;

    let mut patterns = Vec::new();
    let weekend_share = weekend as f64 / total as f64;
    if weekend_share > WEEKEND_SHARE_THRESHOLD {
        patterns.push(HabitPattern {
            name: "Weekend Warrior".to_string(),
            description: "A disproportionate share of sessions land on weekends".to_string(),
            frequency: weekend,
            confidence: (weekend_share * 100.0 * WEEKEND_CONFIDENCE_BOOST).min(MAX_CONFIDENCE),
        });
    }
    let weekday_share = weekday as f64 / total as f64;
    if weekday_share > WEEKDAY_SHARE_THRESHOLD {
        patterns.push(HabitPattern {
            name: "Weekday Grinder".to_string(),
            description: "Sessions concentrate on working days".to_string(),
            frequency: weekday,
            confidence: confidence_from_share(weekday_share),
        });
    }
    patterns
}

/// Project-focus patterns over the trailing 30 days.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn detect_focus_patterns(sessions: &[SessionSummary], now: NaiveDateTime) -> Vec<HabitPattern> {
    let recent: Vec<&SessionSummary> = sessions
        .iter()
        .filter(|s| in_window(s, now, PATTERN_WINDOW_DAYS))
        .collect();
    if recent.is_empty() {
        return Vec::new();
    }

    // Per-project duration and session tallies.
    let mut by_project: std::collections::HashMap<&str, (i64, i64)> =
        std::collections::HashMap::new();
    for session in &recent {
        let entry = by_project.entry(session.project.as_str()).or_insert((0, 0));
        entry.0 += session.duration_ms;
        entry.1 += 1;
    }

    let total_duration: i64 = by_project.values().map(|(d, _)| *d).sum();
    let mut durations: Vec<(&str, i64, i64)> = by_project
        .iter()
        .map(|(p, (d, n))| (*p, *d, *n))
        .collect();
    durations.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut patterns = Vec::new();

    if total_duration > 0 {
        let (top_project, top_duration, top_sessions) = durations[0];
        let top_share = top_duration as f64 / total_duration as f64;
        if top_share > 0.5 {
            patterns.push(HabitPattern {
                name: "Single Project Focus".to_string(),
                description: format!("Over half of recent time went into {top_project}"),
                frequency: top_sessions,
                confidence: confidence_from_share(top_share),
            });
        }

        let project_count = durations.len();
        if project_count >= 5 {
            let top5_duration: i64 = durations.iter().take(5).map(|(_, d, _)| *d).sum();
            let top5_share = top5_duration as f64 / total_duration as f64;
            if top5_share < 0.8 {
                patterns.push(HabitPattern {
                    name: "Multi-Project Juggler".to_string(),
                    description: format!("Time is spread across {project_count} active projects"),
                    frequency: project_count as i64,
                    confidence: (project_count as f64 * 10.0).min(MAX_CONFIDENCE),
                });
            }
        }
    }

    // Context switching: many projects whose average session is much shorter
    // than the global mean.
    let global_mean = total_duration as f64 / recent.len() as f64;
    if global_mean > 0.0 && durations.len() > 1 {
        let short_projects = durations
            .iter()
            .filter(|(_, duration, count)| (*duration as f64 / *count as f64) < global_mean / 2.0)
            .count();
        let short_share = short_projects as f64 / durations.len() as f64;
        if short_share > 0.4 {
            patterns.push(HabitPattern {
                name: "Context Switcher".to_string(),
                description: "Many projects see short, fragmented sessions".to_string(),
                frequency: short_projects as i64,
                confidence: confidence_from_share(short_share),
            });
        }
    }

    patterns
}

/// Runs every detector and returns the combined list sorted by descending
/// confidence.
#[must_use]
pub fn detect_patterns(sessions: &[SessionSummary], now: NaiveDateTime) -> Vec<HabitPattern> {
    let mut patterns = detect_time_patterns(sessions, now);
    patterns.extend(detect_day_patterns(sessions, now));
    patterns.extend(detect_focus_patterns(sessions, now));
    patterns.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    patterns
}

const fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Computes current and longest streaks from active calendar dates.
///
/// Only dates within the trailing 90 days count. The current streak is the
/// consecutive run ending today or yesterday; an older last-active date means
/// the streak is broken.
#[must_use]
pub fn compute_streaks(active_dates: &[NaiveDate], today: NaiveDate) -> Streaks {
    let cutoff = today
        .checked_sub_days(Days::new(STREAK_WINDOW_DAYS - 1))
        .unwrap_or(NaiveDate::MIN);

    let mut dates: Vec<NaiveDate> = active_dates
        .iter()
        .copied()
        .filter(|d| *d >= cutoff && *d <= today)
        .collect();
    dates.sort_unstable();
    dates.dedup();

    if dates.is_empty() {
        return Streaks::default();
    }

    let mut longest = 1i64;
    let mut run = 1i64;
    for pair in dates.windows(2) {
        if (pair[1] - pair[0]).num_days() == 1 {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let last = *dates.last().unwrap_or(&today);
    let current = if (today - last).num_days() <= 1 {
        let mut count = 1i64;
        for pair in dates.windows(2).rev() {
            if (pair[1] - pair[0]).num_days() == 1 {
                count += 1;
            } else {
                break;
            }
        }
        count
    } else {
        0
    };

    Streaks { current, longest }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session_at(project: &str, y: i32, m: u32, d: u32, hour: u32) -> SessionSummary {
        session_with_duration(project, y, m, d, hour, 600_000)
    }

    fn session_with_duration(
        project: &str,
        y: i32,
        m: u32,
        d: u32,
        hour: u32,
        duration_ms: i64,
    ) -> SessionSummary {
        SessionSummary {
            project: project.to_string(),
            start: date(y, m, d).and_hms_opt(hour, 0, 0).unwrap(),
            duration_ms,
            prompt_count: 5,
        }
    }

    // 2025-06-30 is a Monday.
    fn now() -> NaiveDateTime {
        date(2025, 6, 30).and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn morning_pattern_requires_over_30_percent_share() {
        // 4 of 10 sessions in the morning window.
        let mut sessions = Vec::new();
        for d in 1..=4 {
            sessions.push(session_at("/p", 2025, 6, d, 7));
        }
        for d in 5..=10 {
            sessions.push(session_at("/p", 2025, 6, d, 14));
        }

        let patterns = detect_time_patterns(&sessions, now());
        let morning = patterns.iter().find(|p| p.name == "Morning Person").unwrap();
        assert_eq!(morning.frequency, 4);
        assert!((morning.confidence - 40.0).abs() < 1e-9);

        // 6 of 10 afternoon sessions also clear the bar.
        assert!(patterns.iter().any(|p| p.name == "Afternoon Focus"));
    }

    #[test]
    fn night_window_wraps_midnight_and_uses_lower_threshold() {
        let sessions = vec![
            session_at("/p", 2025, 6, 10, 23),
            session_at("/p", 2025, 6, 11, 2),
            session_at("/p", 2025, 6, 12, 10),
            session_at("/p", 2025, 6, 13, 10),
            session_at("/p", 2025, 6, 14, 10),
            session_at("/p", 2025, 6, 15, 10),
            session_at("/p", 2025, 6, 16, 10),
            session_at("/p", 2025, 6, 17, 10),
        ];

        // Night share is 25%: above the 20% night bar, below the 30% day bar.
        let patterns = detect_time_patterns(&sessions, now());
        assert!(patterns.iter().any(|p| p.name == "Night Owl"));
    }

    #[test]
    fn confidence_is_capped_at_95() {
        let sessions = vec![session_at("/p", 2025, 6, 10, 7); 10];
        let patterns = detect_time_patterns(&sessions, now());
        assert!((patterns[0].confidence - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sessions_outside_window_are_ignored() {
        let sessions = vec![session_at("/p", 2025, 1, 1, 7)];
        assert!(detect_time_patterns(&sessions, now()).is_empty());
    }

    #[test]
    fn weekend_warrior_gets_boosted_confidence() {
        // 2025-06-28/29 are Sat/Sun. 4 weekend, 6 weekday: 40% weekend share.
        let mut sessions = vec![
            session_at("/p", 2025, 6, 28, 10),
            session_at("/p", 2025, 6, 28, 15),
            session_at("/p", 2025, 6, 29, 10),
            session_at("/p", 2025, 6, 29, 15),
        ];
        for d in 23..=27 {
            sessions.push(session_at("/p", 2025, 6, d, 10));
        }
        sessions.push(session_at("/p", 2025, 6, 30, 10));

        let patterns = detect_day_patterns(&sessions, now());
        let weekend = patterns.iter().find(|p| p.name == "Weekend Warrior").unwrap();
        // share 0.4 boosted by 1.5 -> 60, not the unboosted 40.
        assert!((weekend.confidence - 60.0).abs() < 1e-9);
    }

    #[test]
    fn weekday_grinder_above_60_percent() {
        let mut sessions = Vec::new();
        for d in 23..=27 {
            sessions.push(session_at("/p", 2025, 6, d, 10));
        }
        sessions.push(session_at("/p", 2025, 6, 28, 10));

        let patterns = detect_day_patterns(&sessions, now());
        let grinder = patterns.iter().find(|p| p.name == "Weekday Grinder").unwrap();
        assert_eq!(grinder.frequency, 5);
    }

    #[test]
    fn single_project_focus_over_half_duration() {
        let sessions = vec![
            session_with_duration("/main", 2025, 6, 20, 10, 3_600_000),
            session_with_duration("/side", 2025, 6, 21, 10, 600_000),
            session_with_duration("/other", 2025, 6, 22, 10, 600_000),
        ];

        let patterns = detect_focus_patterns(&sessions, now());
        let focus = patterns
            .iter()
            .find(|p| p.name == "Single Project Focus")
            .unwrap();
        assert!(focus.description.contains("/main"));
    }

    #[test]
    fn juggler_needs_five_projects_and_spread_time() {
        // Seven equally-weighted projects: top-5 share is 5/7, under 80%.
        let sessions: Vec<SessionSummary> = (0..7)
            .map(|i| {
                session_with_duration(&format!("/p{i}"), 2025, 6, 20 + i, 10, 600_000)
            })
            .collect();

        let patterns = detect_focus_patterns(&sessions, now());
        assert!(patterns.iter().any(|p| p.name == "Multi-Project Juggler"));
    }

    #[test]
    fn context_switcher_flags_short_fragmented_projects() {
        // One long-session project, two projects with much shorter sessions.
        let sessions = vec![
            session_with_duration("/deep", 2025, 6, 20, 10, 10_000_000),
            session_with_duration("/quick-a", 2025, 6, 21, 10, 500_000),
            session_with_duration("/quick-b", 2025, 6, 22, 10, 500_000),
        ];

        let patterns = detect_focus_patterns(&sessions, now());
        let switcher = patterns.iter().find(|p| p.name == "Context Switcher").unwrap();
        assert_eq!(switcher.frequency, 2);
    }

    #[test]
    fn detect_patterns_sorts_by_confidence_descending() {
        let mut sessions = Vec::new();
        for d in 1..=9 {
            sessions.push(session_at("/p", 2025, 6, d, 7));
        }
        sessions.push(session_at("/p", 2025, 6, 10, 14));

        let patterns = detect_patterns(&sessions, now());
        for pair in patterns.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn streak_counts_consecutive_days_ending_today() {
        let today = date(2025, 6, 30);
        let dates = vec![
            date(2025, 6, 27),
            date(2025, 6, 28),
            date(2025, 6, 29),
            date(2025, 6, 30),
        ];
        let streaks = compute_streaks(&dates, today);
        assert_eq!(streaks.current, 4);
        assert_eq!(streaks.longest, 4);
    }

    #[test]
    fn gap_caps_current_streak_at_post_gap_run() {
        let today = date(2025, 6, 30);
        let dates = vec![
            date(2025, 6, 20),
            date(2025, 6, 21),
            date(2025, 6, 22),
            date(2025, 6, 23),
            // gap
            date(2025, 6, 29),
            date(2025, 6, 30),
        ];
        let streaks = compute_streaks(&dates, today);
        assert_eq!(streaks.current, 2);
        assert_eq!(streaks.longest, 4);
    }

    #[test]
    fn streak_survives_when_last_active_yesterday() {
        let today = date(2025, 6, 30);
        let dates = vec![date(2025, 6, 28), date(2025, 6, 29)];
        let streaks = compute_streaks(&dates, today);
        assert_eq!(streaks.current, 2);
    }

    #[test]
    fn streak_breaks_after_two_idle_days() {
        let today = date(2025, 6, 30);
        let dates = vec![date(2025, 6, 27), date(2025, 6, 28)];
        let streaks = compute_streaks(&dates, today);
        assert_eq!(streaks.current, 0);
        assert_eq!(streaks.longest, 2);
    }

    #[test]
    fn streak_ignores_dates_outside_90_day_window() {
        let today = date(2025, 6, 30);
        let dates = vec![date(2025, 1, 1), date(2025, 1, 2), date(2025, 6, 30)];
        let streaks = compute_streaks(&dates, today);
        assert_eq!(streaks.current, 1);
        assert_eq!(streaks.longest, 1);
    }

    #[test]
    fn no_activity_means_no_streaks() {
        let streaks = compute_streaks(&[], date(2025, 6, 30));
        assert_eq!(streaks, Streaks::default());
    }

    #[test]
    fn duplicate_dates_count_once() {
        let today = date(2025, 6, 30);
        let dates = vec![date(2025, 6, 30), date(2025, 6, 30), date(2025, 6, 29)];
        let streaks = compute_streaks(&dates, today);
        assert_eq!(streaks.current, 2);
    }
}
