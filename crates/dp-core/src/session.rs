//! Grouping raw prompt events into discrete sessions.
//!
//! Explicit session identifiers, when present, take precedence: they mark
//! instrumented boundaries. The idle-gap and project-change rules are
//! fallback heuristics for un-instrumented event streams.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::log::PromptEvent;

/// An event more than this far from the open session's end starts a new one.
/// Tunable, not a hard law.
pub const DEFAULT_IDLE_GAP_MS: i64 = 1_800_000;

/// A contiguous span of prompt events sharing session identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Explicit identifier from the log, or a synthesized one.
    pub session_id: String,
    pub project: String,
    /// Epoch milliseconds of the first event.
    pub start_ms: i64,
    /// Epoch milliseconds of the last event. Always >= `start_ms`.
    pub end_ms: i64,
    pub prompt_count: i64,
    pub first_prompt: String,
    pub last_prompt: String,
}

impl Session {
    #[must_use]
    pub const fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_ms)
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.end_ms)
    }
}

/// A lightweight per-session view consumed by the analytics layers.
///
/// `start` is local-naive: callers convert store timestamps to the timezone
/// they want hour/day bucketing performed in.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub project: String,
    pub start: NaiveDateTime,
    pub duration_ms: i64,
    pub prompt_count: i64,
}

/// Synthesized session ids are deterministic so re-syncing the same log
/// produces the same rows.
fn synthesized_session_id(project: &str, start_ms: i64) -> String {
    let content = format!("session|{project}|{start_ms}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
}

#[derive(Debug)]
struct OpenSession {
    explicit_id: Option<String>,
    project: String,
    start_ms: i64,
    end_ms: i64,
    prompt_count: i64,
    first_prompt: String,
    last_prompt: String,
}

impl OpenSession {
    fn begin(event: &PromptEvent) -> Self {
        Self {
            explicit_id: event.session_id.clone(),
            project: event.project.clone(),
            start_ms: event.timestamp_ms,
            end_ms: event.timestamp_ms,
            prompt_count: 1,
            first_prompt: event.display.clone(),
            last_prompt: event.display.clone(),
        }
    }

    fn accepts(&self, event: &PromptEvent, idle_gap_ms: i64) -> bool {
        self.explicit_id == event.session_id
            && self.project == event.project
            && event.timestamp_ms - self.end_ms <= idle_gap_ms
    }

    fn extend(&mut self, event: &PromptEvent) {
        self.end_ms = event.timestamp_ms;
        self.prompt_count += 1;
        self.last_prompt.clone_from(&event.display);
    }

    fn finalize(self) -> Session {
        let session_id = self
            .explicit_id
            .unwrap_or_else(|| synthesized_session_id(&self.project, self.start_ms));
        Session {
            session_id,
            project: self.project,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            prompt_count: self.prompt_count,
            first_prompt: self.first_prompt,
            last_prompt: self.last_prompt,
        }
    }
}

/// Groups a flat, unordered event stream into sessions.
///
/// Events are sorted by timestamp (stable for ties), then walked with one
/// open accumulator. A new session starts when no session is open, the
/// explicit session identifier differs, the project differs, or the gap
/// from the accumulator's end exceeds `idle_gap_ms`.
#[must_use]
pub fn group_into_sessions(events: &[PromptEvent], idle_gap_ms: i64) -> Vec<Session> {
    let mut sorted: Vec<&PromptEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp_ms);

    let mut sessions = Vec::new();
    let mut open: Option<OpenSession> = None;

    for event in sorted {
        match open.as_mut() {
            Some(current) if current.accepts(event, idle_gap_ms) => current.extend(event),
            Some(_) => {
                if let Some(finished) = open.take() {
                    sessions.push(finished.finalize());
                }
                open = Some(OpenSession::begin(event));
            }
            None => open = Some(OpenSession::begin(event)),
        }
    }

    if let Some(finished) = open {
        sessions.push(finished.finalize());
    }

    sessions
}
