//! Readers for the prompt history log and the per-project metrics snapshot.
//!
//! Both inputs are local files written by the coding assistant. A missing
//! file is not an error and yields an empty result; a malformed history line
//! is skipped with a warning. Only an unparseable metrics document is fatal.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Buffer size for `BufReader` (64KB, history logs can grow large).
const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse metrics snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metrics snapshot is not a JSON object")]
    NotAnObject,
}

/// One raw prompt interaction from the history log.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptEvent {
    /// Free-text prompt content.
    pub display: String,
    /// Absolute path of the project the prompt was issued from.
    pub project: String,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Explicit session identifier, when the log was instrumented with one.
    pub session_id: Option<String>,
    /// Pasted-content blobs keyed by placeholder id.
    pub pasted_contents: Option<HashMap<String, serde_json::Value>>,
}

/// Wire shape of a history line. All fields optional so validation can
/// report what is missing instead of failing the whole deserialization.
#[derive(Debug, Deserialize)]
struct RawHistoryLine {
    display: Option<String>,
    project: Option<String>,
    timestamp: Option<i64>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    #[serde(rename = "pastedContents")]
    pasted_contents: Option<HashMap<String, serde_json::Value>>,
}

impl RawHistoryLine {
    fn validate(self) -> Result<PromptEvent, &'static str> {
        let display = self.display.ok_or("missing display")?;
        let project = self.project.filter(|p| !p.is_empty()).ok_or("missing project")?;
        let timestamp_ms = self.timestamp.ok_or("missing timestamp")?;
        if timestamp_ms <= 0 {
            return Err("non-positive timestamp");
        }
        Ok(PromptEvent {
            display,
            project,
            timestamp_ms,
            session_id: self.session_id.filter(|s| !s.is_empty()),
            pasted_contents: self.pasted_contents,
        })
    }
}

/// Per-project usage metrics reported by the assistant's own bookkeeping.
///
/// Every numeric field defaults to zero when absent; unknown fields are
/// ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ProjectMetrics {
    #[serde(rename = "lastCost", default)]
    pub cost: f64,
    #[serde(rename = "lastDuration", default)]
    pub duration_ms: i64,
    #[serde(rename = "lastAPIDuration", default)]
    pub api_duration_ms: i64,
    #[serde(rename = "lastLinesAdded", default)]
    pub lines_added: i64,
    #[serde(rename = "lastLinesRemoved", default)]
    pub lines_removed: i64,
    #[serde(rename = "lastTotalInputTokens", default)]
    pub input_tokens: i64,
    #[serde(rename = "lastTotalOutputTokens", default)]
    pub output_tokens: i64,
    #[serde(rename = "lastTotalCacheCreationInputTokens", default)]
    pub cache_creation_tokens: i64,
    #[serde(rename = "lastTotalCacheReadInputTokens", default)]
    pub cache_read_tokens: i64,
}

/// Reads the line-delimited history log into prompt events, in order of
/// appearance.
///
/// A missing file yields an empty list. Lines that fail to parse or fail
/// structural validation are skipped with a warning.
pub fn read_event_log(path: &Path) -> Result<Vec<PromptEvent>, ReadError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "history log not found, no events yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut events = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let raw: RawHistoryLine = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(line = line_num + 1, error = %e, "skipping malformed history line");
                continue;
            }
        };

        match raw.validate() {
            Ok(event) => events.push(event),
            Err(reason) => {
                tracing::warn!(line = line_num + 1, reason, "skipping invalid history line");
            }
        }
    }

    Ok(events)
}

/// Reads the metrics snapshot: a single JSON object mapping project path to
/// a metrics record.
///
/// A missing file yields an empty map. Top-level entries whose value is not
/// an object are ignored. An unparseable document is an error.
pub fn read_project_metrics(path: &Path) -> Result<HashMap<String, ProjectMetrics>, ReadError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "metrics snapshot not found, no metrics yet");
            return Ok(HashMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    let document: serde_json::Value = serde_json::from_str(&contents)?;
    let serde_json::Value::Object(entries) = document else {
        return Err(ReadError::NotAnObject);
    };

    let mut metrics = HashMap::new();
    for (project, value) in entries {
        if !value.is_object() {
            tracing::debug!(project, "ignoring non-object metrics entry");
            continue;
        }
        match serde_json::from_value::<ProjectMetrics>(value) {
            Ok(parsed) => {
                metrics.insert(project, parsed);
            }
            Err(e) => {
                tracing::warn!(project, error = %e, "skipping unreadable metrics entry");
            }
        }
    }

    Ok(metrics)
}
