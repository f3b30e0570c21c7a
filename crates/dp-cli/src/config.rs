//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use dp_core::session::DEFAULT_IDLE_GAP_MS;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Path to the assistant's prompt history log.
    pub event_log_path: PathBuf,
    /// Path to the assistant's per-project metrics snapshot.
    pub metrics_path: PathBuf,
    /// Idle gap that splits sessions, in milliseconds.
    pub idle_gap_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("dp.db"),
            event_log_path: home.join(".claude").join("history.jsonl"),
            metrics_path: home.join(".claude.json"),
            idle_gap_ms: DEFAULT_IDLE_GAP_MS,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, then the default config file, then the
    /// given file, then `DP_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("DP_").only(&[
            "database_path",
            "event_log_path",
            "metrics_path",
            "idle_gap_ms",
        ]));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for dp.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("devpulse"))
}

/// Returns the platform-specific data directory for dp.
///
/// On Linux: `~/.local/share/devpulse`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("devpulse"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_path_ends_with_devpulse() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "devpulse");
    }

    #[test]
    fn default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("dp.db"));
        assert_eq!(config.idle_gap_ms, DEFAULT_IDLE_GAP_MS);
    }

    #[test]
    fn default_paths_point_at_assistant_files() {
        let config = Config::default();
        assert!(config.event_log_path.ends_with(".claude/history.jsonl"));
        assert!(config.metrics_path.ends_with(".claude.json"));
    }
}
