//! Incremental sync from the assistant's on-disk logs into the database.
//!
//! Each run reads the prompt history and the per-project metrics snapshot,
//! groups new events into sessions, and folds the results into the
//! `sessions`, `prompts`, and `projects` tables. A watermark in the
//! `metadata` table keeps repeat runs from reprocessing old events.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use dp_core::log::{self, PromptEvent, ReadError};
use dp_core::session::{Session, group_into_sessions};

use crate::{Database, DbError, ProjectRow, PromptRow, SessionRow, format_timestamp, parse_timestamp};

/// Metadata key holding the last successful sync time.
pub const LAST_SYNC_KEY: &str = "last_sync_time";

/// Sync errors that abort the whole run. Per-record failures are collected
/// in [`SyncReport::errors`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("failed to read event sources: {0}")]
    Read(#[from] ReadError),
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub events_processed: usize,
    pub sessions_created: usize,
    pub projects_updated: usize,
    pub errors: Vec<String>,
}

/// Runs a full sync pass.
///
/// Events at or before the stored watermark are skipped; the watermark
/// advances to `now` once the pass completes. Reader-level failures abort;
/// anything per-record lands in the report and the pass continues.
pub fn sync(
    db: &mut Database,
    log_path: &Path,
    metrics_path: &Path,
    idle_gap_ms: i64,
    now: DateTime<Utc>,
) -> Result<SyncReport, SyncError> {
    let events = log::read_event_log(log_path)?;
    let metrics = log::read_project_metrics(metrics_path)?;

    let watermark_ms = match db.get_metadata(LAST_SYNC_KEY)? {
        Some(value) => Some(parse_timestamp(&value, LAST_SYNC_KEY)?.timestamp_millis()),
        None => None,
    };
    let fresh: Vec<PromptEvent> = events
        .into_iter()
        .filter(|event| watermark_ms.is_none_or(|mark| event.timestamp_ms > mark))
        .collect();

    let mut report = SyncReport {
        events_processed: fresh.len(),
        ..SyncReport::default()
    };

    let sessions = group_into_sessions(&fresh, idle_gap_ms);
    let stored = store_sessions(db, &sessions, &mut report)?;
    store_prompts(db, &fresh, &stored, &mut report)?;
    update_projects(db, &stored, &metrics, &mut report, now)?;

    db.set_metadata(LAST_SYNC_KEY, &format_timestamp(now))?;

    tracing::info!(
        events = report.events_processed,
        sessions = report.sessions_created,
        projects = report.projects_updated,
        errors = report.errors.len(),
        "sync complete"
    );
    Ok(report)
}

fn store_sessions<'a>(
    db: &mut Database,
    sessions: &'a [Session],
    report: &mut SyncReport,
) -> Result<Vec<&'a Session>, SyncError> {
    let mut stored = Vec::with_capacity(sessions.len());
    for session in sessions {
        let (Some(start), Some(end)) = (session.start_time(), session.end_time()) else {
            report.errors.push(format!(
                "session {} has an out-of-range timestamp",
                session.session_id
            ));
            continue;
        };
        let row = SessionRow {
            id: session.session_id.clone(),
            project_path: session.project.clone(),
            start_time: format_timestamp(start),
            end_time: format_timestamp(end),
            prompt_count: session.prompt_count,
            duration_ms: session.duration_ms(),
            first_prompt: session.first_prompt.clone(),
            last_prompt: session.last_prompt.clone(),
        };
        match db.upsert_session(&row) {
            Ok(inserted) => {
                if inserted {
                    report.sessions_created += 1;
                }
                stored.push(session);
            }
            Err(err) => {
                report
                    .errors
                    .push(format!("session {}: {err}", session.session_id));
            }
        }
    }
    Ok(stored)
}

fn store_prompts(
    db: &mut Database,
    events: &[PromptEvent],
    sessions: &[&Session],
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    for event in events {
        let Some(session) = owning_session(event, sessions) else {
            report.errors.push(format!(
                "no session for prompt in {} at {}",
                event.project, event.timestamp_ms
            ));
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp_millis(event.timestamp_ms) else {
            report.errors.push(format!(
                "prompt in {} has an out-of-range timestamp {}",
                event.project, event.timestamp_ms
            ));
            continue;
        };
        let row = PromptRow {
            id: deterministic_prompt_id(&session.session_id, event),
            session_id: session.session_id.clone(),
            project_path: event.project.clone(),
            timestamp: format_timestamp(timestamp),
            content: event.display.clone(),
        };
        if let Err(err) = db.insert_prompt(&row) {
            report.errors.push(format!("prompt {}: {err}", row.id));
        }
    }
    Ok(())
}

/// Finds the session an event belongs to: explicit id when the event carries
/// one, otherwise timestamp containment within the same project.
fn owning_session<'a>(event: &PromptEvent, sessions: &[&'a Session]) -> Option<&'a Session> {
    if let Some(id) = &event.session_id {
        if let Some(session) = sessions.iter().find(|s| s.session_id == *id) {
            return Some(session);
        }
    }
    sessions
        .iter()
        .find(|s| {
            s.project == event.project
                && s.start_ms <= event.timestamp_ms
                && event.timestamp_ms <= s.end_ms
        })
        .copied()
}

fn deterministic_prompt_id(session_id: &str, event: &PromptEvent) -> String {
    let content = format!(
        "prompt|{session_id}|{}|{}",
        event.timestamp_ms, event.display
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
}

#[derive(Debug, Default)]
struct ProjectDelta {
    sessions: i64,
    prompts: i64,
    duration_ms: i64,
    first_start: Option<String>,
    last_end: Option<String>,
}

/// Folds this batch's sessions and the metrics snapshot into the project
/// rollups. Counts accumulate; cost, token, and line figures mirror the
/// snapshot, which is itself cumulative.
fn update_projects(
    db: &mut Database,
    sessions: &[&Session],
    metrics: &HashMap<String, log::ProjectMetrics>,
    report: &mut SyncReport,
    now: DateTime<Utc>,
) -> Result<(), SyncError> {
    let mut deltas: HashMap<&str, ProjectDelta> = HashMap::new();
    for session in sessions {
        let (Some(start), Some(end)) = (session.start_time(), session.end_time()) else {
            continue;
        };
        let start = format_timestamp(start);
        let end = format_timestamp(end);
        let delta = deltas.entry(session.project.as_str()).or_default();
        delta.sessions += 1;
        delta.prompts += session.prompt_count;
        delta.duration_ms += session.duration_ms();
        if delta.first_start.as_ref().is_none_or(|s| start < *s) {
            delta.first_start = Some(start);
        }
        if delta.last_end.as_ref().is_none_or(|e| end > *e) {
            delta.last_end = Some(end);
        }
    }

    let mut paths: Vec<&str> = deltas.keys().copied().collect();
    for path in metrics.keys() {
        if !deltas.contains_key(path.as_str()) {
            paths.push(path);
        }
    }
    paths.sort_unstable();

    for path in paths {
        let existing = match db.get_project(path) {
            Ok(existing) => existing,
            Err(err) => {
                report.errors.push(format!("project {path}: {err}"));
                continue;
            }
        };
        let delta = deltas.get(path);
        let snapshot = metrics.get(path);
        let fallback = format_timestamp(now);

        let mut row = existing.unwrap_or_else(|| ProjectRow {
            path: path.to_string(),
            first_seen: fallback.clone(),
            last_active: fallback.clone(),
            prompt_count: 0,
            session_count: 0,
            duration_ms: 0,
            lines_added: 0,
            lines_removed: 0,
            total_cost: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
        });

        if let Some(delta) = delta {
            row.session_count += delta.sessions;
            row.prompt_count += delta.prompts;
            row.duration_ms += delta.duration_ms;
            if let Some(first) = &delta.first_start {
                if *first < row.first_seen {
                    row.first_seen.clone_from(first);
                }
            }
            if let Some(last) = &delta.last_end {
                if *last > row.last_active {
                    row.last_active.clone_from(last);
                }
            }
        }
        if let Some(snapshot) = snapshot {
            row.total_cost = snapshot.cost;
            row.lines_added = snapshot.lines_added;
            row.lines_removed = snapshot.lines_removed;
            row.input_tokens = snapshot.input_tokens;
            row.output_tokens = snapshot.output_tokens;
            row.cache_creation_tokens = snapshot.cache_creation_tokens;
            row.cache_read_tokens = snapshot.cache_read_tokens;
        }

        if let Err(err) = db.upsert_project(&row) {
            report.errors.push(format!("project {path}: {err}"));
        } else {
            report.projects_updated += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write as _;

    fn write_history(dir: &tempfile::TempDir, lines: &[String]) -> std::path::PathBuf {
        let path = dir.path().join("history.jsonl");
        let mut file = fs::File::create(&path).expect("create history");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
        path
    }

    fn history_line(display: &str, project: &str, timestamp_ms: i64) -> String {
        serde_json::json!({
            "display": display,
            "project": project,
            "timestamp": timestamp_ms,
        })
        .to_string()
    }

    fn missing(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        dir.path().join(name)
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-30T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    // 2025-06-30T08:00:00Z
    const BASE_MS: i64 = 1_751_270_400_000;
    const MINUTE_MS: i64 = 60_000;

    #[test]
    fn empty_inputs_produce_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_in_memory().unwrap();

        let report = sync(
            &mut db,
            &missing(&dir, "history.jsonl"),
            &missing(&dir, "metrics.json"),
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now(),
        )
        .unwrap();

        assert_eq!(report.events_processed, 0);
        assert_eq!(report.sessions_created, 0);
        assert_eq!(report.projects_updated, 0);
        assert!(report.errors.is_empty());
        assert!(db.get_metadata(LAST_SYNC_KEY).unwrap().is_some());
    }

    #[test]
    fn idle_gap_splits_events_into_two_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let history = write_history(
            &dir,
            &[
                history_line("first", "/repo", BASE_MS),
                history_line("second", "/repo", BASE_MS + 10 * MINUTE_MS),
                history_line("third", "/repo", BASE_MS + 50 * MINUTE_MS),
            ],
        );
        let mut db = Database::open_in_memory().unwrap();

        let report = sync(
            &mut db,
            &history,
            &missing(&dir, "metrics.json"),
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now(),
        )
        .unwrap();

        assert_eq!(report.events_processed, 3);
        assert_eq!(report.sessions_created, 2);
        assert_eq!(report.projects_updated, 1);
        assert!(report.errors.is_empty());

        let sessions = db.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].prompt_count, 2);
        assert_eq!(sessions[0].first_prompt, "first");
        assert_eq!(sessions[0].last_prompt, "second");
        assert_eq!(sessions[1].prompt_count, 1);

        let project = db.get_project("/repo").unwrap().unwrap();
        assert_eq!(project.session_count, 2);
        assert_eq!(project.prompt_count, 3);
    }

    #[test]
    fn second_sync_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let history = write_history(
            &dir,
            &[
                history_line("first", "/repo", BASE_MS),
                history_line("second", "/repo", BASE_MS + 10 * MINUTE_MS),
            ],
        );
        let mut db = Database::open_in_memory().unwrap();
        let metrics = missing(&dir, "metrics.json");

        sync(
            &mut db,
            &history,
            &metrics,
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now(),
        )
        .unwrap();
        let before_sessions = db.list_sessions().unwrap();
        let before_projects = db.list_projects().unwrap();

        let report = sync(
            &mut db,
            &history,
            &metrics,
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now() + chrono::Duration::hours(1),
        )
        .unwrap();

        assert_eq!(report.events_processed, 0);
        assert_eq!(report.sessions_created, 0);
        assert!(report.errors.is_empty());
        assert_eq!(db.list_sessions().unwrap(), before_sessions);
        assert_eq!(db.list_projects().unwrap(), before_projects);
    }

    #[test]
    fn watermark_admits_only_newer_events() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = missing(&dir, "metrics.json");
        let mut db = Database::open_in_memory().unwrap();

        let history = write_history(&dir, &[history_line("first", "/repo", BASE_MS)]);
        sync(
            &mut db,
            &history,
            &metrics,
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now(),
        )
        .unwrap();

        // Appends an event after the watermark and re-syncs the full log.
        let later_ms = now().timestamp_millis() + 5 * MINUTE_MS;
        let history = write_history(
            &dir,
            &[
                history_line("first", "/repo", BASE_MS),
                history_line("later", "/repo", later_ms),
            ],
        );
        let report = sync(
            &mut db,
            &history,
            &metrics,
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now() + chrono::Duration::hours(1),
        )
        .unwrap();

        assert_eq!(report.events_processed, 1);
        assert_eq!(report.sessions_created, 1);
        assert_eq!(db.list_sessions().unwrap().len(), 2);
    }

    #[test]
    fn metrics_snapshot_fills_cost_and_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let history = write_history(&dir, &[history_line("first", "/repo", BASE_MS)]);
        let metrics_path = dir.path().join("metrics.json");
        fs::write(
            &metrics_path,
            serde_json::json!({
                "/repo": {
                    "lastCost": 2.5,
                    "lastLinesAdded": 40,
                    "lastLinesRemoved": 10,
                    "lastTotalInputTokens": 1000,
                    "lastTotalOutputTokens": 3000,
                    "lastTotalCacheCreationInputTokens": 100,
                    "lastTotalCacheReadInputTokens": 900,
                },
                "/untracked": {
                    "lastCost": 0.5,
                },
            })
            .to_string(),
        )
        .unwrap();
        let mut db = Database::open_in_memory().unwrap();

        let report = sync(
            &mut db,
            &history,
            &metrics_path,
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now(),
        )
        .unwrap();

        // One project from sessions, one from the snapshot alone.
        assert_eq!(report.projects_updated, 2);

        let repo = db.get_project("/repo").unwrap().unwrap();
        assert!((repo.total_cost - 2.5).abs() < f64::EPSILON);
        assert_eq!(repo.lines_added, 40);
        assert_eq!(repo.cache_read_tokens, 900);
        assert_eq!(repo.session_count, 1);

        let untracked = db.get_project("/untracked").unwrap().unwrap();
        assert!((untracked.total_cost - 0.5).abs() < f64::EPSILON);
        assert_eq!(untracked.session_count, 0);
    }

    #[test]
    fn prompt_rows_link_back_to_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let history = write_history(
            &dir,
            &[
                history_line("first", "/repo", BASE_MS),
                history_line("second", "/repo", BASE_MS + MINUTE_MS),
            ],
        );
        let mut db = Database::open_in_memory().unwrap();

        sync(
            &mut db,
            &history,
            &missing(&dir, "metrics.json"),
            dp_core::session::DEFAULT_IDLE_GAP_MS,
            now(),
        )
        .unwrap();

        let sessions = db.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        let count: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM prompts WHERE session_id = ?",
                [&sessions[0].id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
