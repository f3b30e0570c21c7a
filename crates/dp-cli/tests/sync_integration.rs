//! Integration tests for the sync command.

use std::fs;
use std::io::Write;
use std::process::Command;

use tempfile::TempDir;

// 2025-01-15T10:00:00Z
const BASE_MS: i64 = 1_736_935_200_000;
const MINUTE_MS: i64 = 60_000;

struct Fixture {
    dir: TempDir,
    config_path: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("dp.db");
        let history_path = dir.path().join("history.jsonl");
        let metrics_path = dir.path().join("metrics.json");

        let config_path = dir.path().join("config.toml");
        let mut config = fs::File::create(&config_path).unwrap();
        writeln!(config, r#"database_path = "{}""#, db_path.display()).unwrap();
        writeln!(config, r#"event_log_path = "{}""#, history_path.display()).unwrap();
        writeln!(config, r#"metrics_path = "{}""#, metrics_path.display()).unwrap();
        config.flush().unwrap();

        Self { dir, config_path }
    }

    fn write_history(&self, events: &[(&str, &str, i64)]) {
        let lines: Vec<String> = events
            .iter()
            .map(|(display, project, timestamp_ms)| {
                serde_json::json!({
                    "display": display,
                    "project": project,
                    "timestamp": timestamp_ms,
                })
                .to_string()
            })
            .collect();
        fs::write(self.dir.path().join("history.jsonl"), lines.join("\n")).unwrap();
    }

    fn run(&self, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_dp"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .output()
            .expect("failed to run dp")
    }
}

#[test]
fn sync_groups_events_and_reports_counts() {
    let fixture = Fixture::new();
    fixture.write_history(&[
        ("fix the login bug", "/home/user/webapp", BASE_MS),
        ("add a test for it", "/home/user/webapp", BASE_MS + 10 * MINUTE_MS),
        ("refactor the parser", "/home/user/webapp", BASE_MS + 50 * MINUTE_MS),
    ]);

    let output = fixture.run(&["sync"]);
    assert!(
        output.status.success(),
        "sync failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Processed 3 events: 2 new sessions, 1 projects updated"),
        "unexpected sync output: {stdout}"
    );
}

#[test]
fn second_sync_processes_nothing_new() {
    let fixture = Fixture::new();
    fixture.write_history(&[
        ("first", "/home/user/webapp", BASE_MS),
        ("second", "/home/user/webapp", BASE_MS + MINUTE_MS),
    ]);

    let output = fixture.run(&["sync"]);
    assert!(output.status.success());

    let output = fixture.run(&["sync"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Processed 0 events"),
        "second sync should be a no-op: {stdout}"
    );
}

#[test]
fn sync_reads_metrics_snapshot() {
    let fixture = Fixture::new();
    fixture.write_history(&[("hello", "/home/user/webapp", BASE_MS)]);
    fs::write(
        fixture.dir.path().join("metrics.json"),
        serde_json::json!({
            "/home/user/webapp": {
                "lastCost": 4.2,
                "lastTotalInputTokens": 1000,
                "lastTotalOutputTokens": 2000,
            }
        })
        .to_string(),
    )
    .unwrap();

    let output = fixture.run(&["sync"]);
    assert!(output.status.success());

    let output = fixture.run(&["cost", "--days", "100000"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("$4.20"), "cost output missing spend: {stdout}");
}

#[test]
fn sync_with_missing_sources_succeeds() {
    let fixture = Fixture::new();

    let output = fixture.run(&["sync"]);
    assert!(
        output.status.success(),
        "sync with no sources should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Processed 0 events"));
}

#[test]
fn malformed_history_lines_are_skipped() {
    let fixture = Fixture::new();
    let history = format!(
        "{}\nnot valid json\n{}\n",
        serde_json::json!({"display": "ok", "project": "/repo", "timestamp": BASE_MS}),
        serde_json::json!({"display": "also ok", "project": "/repo", "timestamp": BASE_MS + MINUTE_MS}),
    );
    fs::write(fixture.dir.path().join("history.jsonl"), history).unwrap();

    let output = fixture.run(&["sync"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Processed 2 events"),
        "malformed line should be skipped, not fatal: {stdout}"
    );
}
