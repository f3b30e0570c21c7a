//! SQLite storage layer for devpulse.
//!
//! Wraps a `rusqlite::Connection`, which is `Send` but not `Sync`; a
//! [`Database`] can be moved between threads but not shared without external
//! synchronization. Each CLI invocation opens its own connection.
//!
//! Timestamps are stored as TEXT in RFC 3339 format so lexicographic ordering
//! matches chronological ordering and rows stay human-readable.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;

pub mod sync;

pub use sync::{SyncError, SyncReport, sync};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp failed to parse.
    #[error("invalid timestamp for {id}: {timestamp}")]
    TimestampParse {
        id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
pub struct Database {
    pub(crate) conn: Connection,
}

/// A stored coding session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRow {
    pub id: String,
    pub project_path: String,
    pub start_time: String,
    pub end_time: String,
    pub prompt_count: i64,
    pub duration_ms: i64,
    pub first_prompt: String,
    pub last_prompt: String,
}

/// A stored prompt, linked to its owning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRow {
    pub id: String,
    pub session_id: String,
    pub project_path: String,
    pub timestamp: String,
    pub content: String,
}

/// Cumulative per-project rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRow {
    pub path: String,
    pub first_seen: String,
    pub last_active: String,
    pub prompt_count: i64,
    pub session_count: i64,
    pub duration_ms: i64,
    pub lines_added: i64,
    pub lines_removed: i64,
    pub total_cost: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
}

/// A persisted achievement unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementRow {
    pub id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: String,
    pub metadata: Option<String>,
}

/// Session and prompt counts grouped by calendar date (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: String,
    pub sessions: i64,
    pub prompts: i64,
}

/// Whole-database aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub sessions: i64,
    pub prompts: i64,
    pub duration_ms: i64,
    pub total_cost: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_creation_tokens: i64,
    pub cache_read_tokens: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database. Useful for testing; the database is
    /// destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), DbError> {
        // In-memory databases report "memory" here; that's fine.
        self.conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                project_path TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                prompt_count INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                first_prompt TEXT NOT NULL DEFAULT '',
                last_prompt TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);
            CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_path);

            CREATE TABLE IF NOT EXISTS prompts (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                project_path TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                content TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_prompts_timestamp ON prompts(timestamp);
            CREATE INDEX IF NOT EXISTS idx_prompts_session ON prompts(session_id);

            CREATE TABLE IF NOT EXISTS projects (
                path TEXT PRIMARY KEY,
                first_seen TEXT NOT NULL,
                last_active TEXT NOT NULL,
                prompt_count INTEGER NOT NULL DEFAULT 0,
                session_count INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                lines_added INTEGER NOT NULL DEFAULT 0,
                lines_removed INTEGER NOT NULL DEFAULT 0,
                total_cost REAL NOT NULL DEFAULT 0,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                cache_creation_tokens INTEGER NOT NULL DEFAULT 0,
                cache_read_tokens INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_projects_last_active ON projects(last_active);

            CREATE TABLE IF NOT EXISTS achievements (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                icon TEXT NOT NULL,
                unlocked_at TEXT NOT NULL,
                metadata TEXT
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts or updates a session, keyed by id.
    ///
    /// An insert sets every field. On conflict only the end time, prompt
    /// count (added), duration, and last prompt change; the start time and
    /// first prompt are immutable once written.
    ///
    /// Returns `true` when a new row was inserted.
    pub fn upsert_session(&mut self, session: &SessionRow) -> Result<bool, DbError> {
        let existing: Option<(String, i64, String)> = self
            .conn
            .query_row(
                "SELECT start_time, prompt_count, end_time FROM sessions WHERE id = ?",
                [&session.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    "
                    INSERT INTO sessions
                    (id, project_path, start_time, end_time, prompt_count, duration_ms, first_prompt, last_prompt)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    ",
                    params![
                        session.id,
                        session.project_path,
                        session.start_time,
                        session.end_time,
                        session.prompt_count,
                        session.duration_ms,
                        session.first_prompt,
                        session.last_prompt,
                    ],
                )?;
                Ok(true)
            }
            Some((start_time, prompt_count, end_time)) => {
                let start = parse_timestamp(&start_time, &session.id)?;
                let new_end = if session.end_time > end_time {
                    session.end_time.clone()
                } else {
                    end_time
                };
                let end = parse_timestamp(&new_end, &session.id)?;
                let duration_ms = end.signed_duration_since(start).num_milliseconds().max(0);
                self.conn.execute(
                    "
                    UPDATE sessions
                    SET end_time = ?, prompt_count = ?, duration_ms = ?, last_prompt = ?
                    WHERE id = ?
                    ",
                    params![
                        new_end,
                        prompt_count + session.prompt_count,
                        duration_ms,
                        session.last_prompt,
                        session.id,
                    ],
                )?;
                Ok(false)
            }
        }
    }

    /// Inserts a prompt, ignoring duplicates by id.
    ///
    /// Returns `true` when the row was actually inserted.
    pub fn insert_prompt(&mut self, prompt: &PromptRow) -> Result<bool, DbError> {
        let inserted = self.conn.execute(
            "
            INSERT OR IGNORE INTO prompts (id, session_id, project_path, timestamp, content)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                prompt.id,
                prompt.session_id,
                prompt.project_path,
                prompt.timestamp,
                prompt.content,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Writes a project rollup row with absolute values, replacing any
    /// existing row for the same path. Callers merge before writing.
    pub fn upsert_project(&mut self, project: &ProjectRow) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO projects
            (path, first_seen, last_active, prompt_count, session_count, duration_ms,
             lines_added, lines_removed, total_cost,
             input_tokens, output_tokens, cache_creation_tokens, cache_read_tokens)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                first_seen = excluded.first_seen,
                last_active = excluded.last_active,
                prompt_count = excluded.prompt_count,
                session_count = excluded.session_count,
                duration_ms = excluded.duration_ms,
                lines_added = excluded.lines_added,
                lines_removed = excluded.lines_removed,
                total_cost = excluded.total_cost,
                input_tokens = excluded.input_tokens,
                output_tokens = excluded.output_tokens,
                cache_creation_tokens = excluded.cache_creation_tokens,
                cache_read_tokens = excluded.cache_read_tokens
            ",
            params![
                project.path,
                project.first_seen,
                project.last_active,
                project.prompt_count,
                project.session_count,
                project.duration_ms,
                project.lines_added,
                project.lines_removed,
                project.total_cost,
                project.input_tokens,
                project.output_tokens,
                project.cache_creation_tokens,
                project.cache_read_tokens,
            ],
        )?;
        Ok(())
    }

    /// Fetches a single project rollup.
    pub fn get_project(&self, path: &str) -> Result<Option<ProjectRow>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT path, first_seen, last_active, prompt_count, session_count, duration_ms,
                       lines_added, lines_removed, total_cost,
                       input_tokens, output_tokens, cache_creation_tokens, cache_read_tokens
                FROM projects
                WHERE path = ?
                ",
                [path],
                project_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Lists project rollups ordered by most recently active.
    pub fn list_projects(&self) -> Result<Vec<ProjectRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT path, first_seen, last_active, prompt_count, session_count, duration_ms,
                   lines_added, lines_removed, total_cost,
                   input_tokens, output_tokens, cache_creation_tokens, cache_read_tokens
            FROM projects
            ORDER BY last_active DESC, path ASC
            ",
        )?;
        let rows = stmt.query_map([], project_from_row)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    /// Lists all sessions ordered by start time then id.
    pub fn list_sessions(&self) -> Result<Vec<SessionRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, project_path, start_time, end_time, prompt_count, duration_ms,
                   first_prompt, last_prompt
            FROM sessions
            ORDER BY start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], session_from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Lists sessions starting at or after the cutoff.
    pub fn sessions_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionRow>, DbError> {
        let cutoff = format_timestamp(cutoff);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, project_path, start_time, end_time, prompt_count, duration_ms,
                   first_prompt, last_prompt
            FROM sessions
            WHERE start_time >= ?
            ORDER BY start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([cutoff], session_from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Lists all prompts ordered by timestamp then id.
    pub fn list_prompts(&self) -> Result<Vec<PromptRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, session_id, project_path, timestamp, content
            FROM prompts
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PromptRow {
                id: row.get(0)?,
                session_id: row.get(1)?,
                project_path: row.get(2)?,
                timestamp: row.get(3)?,
                content: row.get(4)?,
            })
        })?;
        let mut prompts = Vec::new();
        for row in rows {
            prompts.push(row?);
        }
        Ok(prompts)
    }

    /// Session and prompt counts per UTC calendar date, ascending.
    pub fn daily_activity(&self, cutoff: DateTime<Utc>) -> Result<Vec<DailyActivity>, DbError> {
        let cutoff = format_timestamp(cutoff);
        let mut stmt = self.conn.prepare(
            "
            SELECT substr(start_time, 1, 10) AS day,
                   COUNT(*) AS sessions,
                   SUM(prompt_count) AS prompts
            FROM sessions
            WHERE start_time >= ?
            GROUP BY day
            ORDER BY day ASC
            ",
        )?;
        let rows = stmt.query_map([cutoff], |row| {
            Ok(DailyActivity {
                date: row.get(0)?,
                sessions: row.get(1)?,
                prompts: row.get(2)?,
            })
        })?;
        let mut days = Vec::new();
        for row in rows {
            days.push(row?);
        }
        Ok(days)
    }

    /// Aggregate counters across the whole database. Session-derived fields
    /// come from `sessions`; cost and token fields from `projects`.
    pub fn totals(&self) -> Result<Totals, DbError> {
        let (sessions, prompts, duration_ms) = self.conn.query_row(
            "
            SELECT COUNT(*),
                   COALESCE(SUM(prompt_count), 0),
                   COALESCE(SUM(duration_ms), 0)
            FROM sessions
            ",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let (total_cost, input_tokens, output_tokens, cache_creation_tokens, cache_read_tokens) =
            self.conn.query_row(
                "
                SELECT COALESCE(SUM(total_cost), 0),
                       COALESCE(SUM(input_tokens), 0),
                       COALESCE(SUM(output_tokens), 0),
                       COALESCE(SUM(cache_creation_tokens), 0),
                       COALESCE(SUM(cache_read_tokens), 0)
                FROM projects
                ",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )?;
        Ok(Totals {
            sessions,
            prompts,
            duration_ms,
            total_cost,
            input_tokens,
            output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
        })
    }

    /// Start time of the earliest recorded session, if any.
    pub fn first_session_time(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        let earliest: Option<String> = self
            .conn
            .query_row("SELECT MIN(start_time) FROM sessions", [], |row| row.get(0))
            .optional()?
            .flatten();
        match earliest {
            Some(timestamp) => Ok(Some(parse_timestamp(&timestamp, "first_session")?)),
            None => Ok(None),
        }
    }

    /// Persists an achievement unlock. Re-persisting an unlocked id is a
    /// no-op that keeps the original unlock.
    pub fn insert_achievement(&mut self, achievement: &AchievementRow) -> Result<bool, DbError> {
        let inserted = self.conn.execute(
            "
            INSERT OR IGNORE INTO achievements
            (id, category, title, description, icon, unlocked_at, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                achievement.id,
                achievement.category,
                achievement.title,
                achievement.description,
                achievement.icon,
                achievement.unlocked_at,
                achievement.metadata,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Ids of every unlocked achievement.
    pub fn unlocked_achievement_ids(&self) -> Result<HashSet<String>, DbError> {
        let mut stmt = self.conn.prepare("SELECT id FROM achievements")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// Lists achievements ordered by unlock time, newest first.
    pub fn list_achievements(&self) -> Result<Vec<AchievementRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, category, title, description, icon, unlocked_at, metadata
            FROM achievements
            ORDER BY unlocked_at DESC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AchievementRow {
                id: row.get(0)?,
                category: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                icon: row.get(4)?,
                unlocked_at: row.get(5)?,
                metadata: row.get(6)?,
            })
        })?;
        let mut achievements = Vec::new();
        for row in rows {
            achievements.push(row?);
        }
        Ok(achievements)
    }

    /// Reads a metadata value.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Writes a metadata value, replacing any existing one.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        project_path: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        prompt_count: row.get(4)?,
        duration_ms: row.get(5)?,
        first_prompt: row.get(6)?,
        last_prompt: row.get(7)?,
    })
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        path: row.get(0)?,
        first_seen: row.get(1)?,
        last_active: row.get(2)?,
        prompt_count: row.get(3)?,
        session_count: row.get(4)?,
        duration_ms: row.get(5)?,
        lines_added: row.get(6)?,
        lines_removed: row.get(7)?,
        total_cost: row.get(8)?,
        input_tokens: row.get(9)?,
        output_tokens: row.get(10)?,
        cache_creation_tokens: row.get(11)?,
        cache_read_tokens: row.get(12)?,
    })
}

/// Formats a timestamp the way this database stores them.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored timestamp, reporting which row it belonged to on failure.
pub fn parse_timestamp(timestamp: &str, id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}
