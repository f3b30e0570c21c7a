//! Webhook notifications for devpulse.
//!
//! Sends a single fire-and-forget POST when a sync unlocks something worth
//! announcing. Delivery is strictly best-effort: every transport or encoding
//! failure is swallowed so the primary workflow never blocks on a webhook.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde_json::json;
use thiserror::Error;

use dp_core::Achievement;

/// Payload shape expected by the receiving end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebhookFormat {
    Slack,
    Discord,
    #[default]
    Custom,
}

impl WebhookFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for WebhookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown webhook format string.
#[derive(Debug, Error)]
#[error("invalid webhook format: {0} (expected slack, discord, or custom)")]
pub struct ParseFormatError(String);

impl FromStr for WebhookFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slack" => Ok(Self::Slack),
            "discord" => Ok(Self::Discord),
            "custom" => Ok(Self::Custom),
            other => Err(ParseFormatError(other.to_string())),
        }
    }
}

/// Notifier configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub format: WebhookFormat,
    pub achievements: bool,
    pub streaks: bool,
    pub milestones: bool,
    pub weekly: bool,
    pub debug: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            format: WebhookFormat::default(),
            achievements: true,
            streaks: true,
            milestones: true,
            weekly: false,
            debug: false,
        }
    }
}

impl NotifyConfig {
    /// Reads configuration from `DP_WEBHOOK_URL`, `DP_WEBHOOK_FORMAT`, and
    /// the `DP_NOTIFY_*` toggles. Unset toggles keep their defaults;
    /// unparseable values fall back rather than erroring.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            webhook_url: env::var("DP_WEBHOOK_URL").ok().filter(|url| !url.is_empty()),
            format: env::var("DP_WEBHOOK_FORMAT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            achievements: env_flag("DP_NOTIFY_ACHIEVEMENTS", defaults.achievements),
            streaks: env_flag("DP_NOTIFY_STREAKS", defaults.streaks),
            milestones: env_flag("DP_NOTIFY_MILESTONES", defaults.milestones),
            weekly: env_flag("DP_NOTIFY_WEEKLY", defaults.weekly),
            debug: env_flag("DP_NOTIFY_DEBUG", defaults.debug),
        }
    }

    /// Whether a send would actually go anywhere.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// One achievement line in a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementNote {
    pub title: String,
    pub description: String,
    pub icon: String,
}

impl From<&Achievement> for AchievementNote {
    fn from(achievement: &Achievement) -> Self {
        Self {
            title: achievement.title.clone(),
            description: achievement.description.clone(),
            icon: achievement.icon.clone(),
        }
    }
}

/// A notification ready to be rendered into a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    pub summary: String,
    pub achievements: Vec<AchievementNote>,
}

impl Notification {
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            achievements: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_achievements(mut self, achievements: &[Achievement]) -> Self {
        self.achievements = achievements.iter().map(AchievementNote::from).collect();
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.achievements.is_empty()
    }
}

fn build_payload(format: WebhookFormat, notification: &Notification) -> serde_json::Value {
    match format {
        WebhookFormat::Slack => slack_payload(notification),
        WebhookFormat::Discord => discord_payload(notification),
        WebhookFormat::Custom => custom_payload(notification),
    }
}

fn slack_payload(notification: &Notification) -> serde_json::Value {
    let mut blocks = vec![json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": notification.summary },
    })];
    if !notification.achievements.is_empty() {
        let lines: Vec<String> = notification
            .achievements
            .iter()
            .map(|a| format!("{} *{}* — {}", a.icon, a.title, a.description))
            .collect();
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": lines.join("\n") },
        }));
    }
    json!({ "blocks": blocks })
}

fn discord_payload(notification: &Notification) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = notification
        .achievements
        .iter()
        .map(|a| {
            json!({
                "name": format!("{} {}", a.icon, a.title),
                "value": a.description,
                "inline": false,
            })
        })
        .collect();
    json!({
        "embeds": [{
            "title": "devpulse",
            "description": notification.summary,
            "fields": fields,
        }]
    })
}

fn custom_payload(notification: &Notification) -> serde_json::Value {
    json!({
        "summary": notification.summary,
        "achievements": notification
            .achievements
            .iter()
            .map(|a| {
                json!({
                    "title": a.title,
                    "description": a.description,
                    "icon": a.icon,
                })
            })
            .collect::<Vec<_>>(),
    })
}

/// Posts the notification to the configured webhook.
///
/// Does nothing when no URL is configured or the notification is empty.
/// Failures are logged at debug level and otherwise dropped.
pub async fn send(config: &NotifyConfig, notification: &Notification) {
    let Some(url) = config.webhook_url.as_deref() else {
        return;
    };
    if notification.is_empty() {
        return;
    }
    let payload = build_payload(config.format, notification);
    let result = reqwest::Client::new().post(url).json(&payload).send().await;
    match result {
        Ok(response) if config.debug => {
            tracing::debug!(status = %response.status(), format = %config.format, "webhook delivered");
        }
        Ok(_) => {}
        Err(err) => {
            tracing::debug!(error = %err, "webhook delivery failed");
        }
    }
}

/// Synchronous wrapper around [`send`] for callers without a runtime.
///
/// Builds a single-use current-thread runtime; if even that fails, the
/// notification is dropped.
pub fn send_blocking(config: &NotifyConfig, notification: &Notification) {
    if !config.is_enabled() || notification.is_empty() {
        return;
    }
    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(send(config, notification)),
        Err(err) => {
            tracing::debug!(error = %err, "failed to build webhook runtime");
        }
    }
}
