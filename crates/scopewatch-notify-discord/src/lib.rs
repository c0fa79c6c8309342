// # Discord Notifier
//
// This crate delivers scopewatch change events to a Discord channel through
// an incoming webhook.
//
// ## Message layout
//
// Every message is a single embed posted under a fixed bot username:
//
// - New scope asset: title is the program name, link is the program page,
//   body lists the maximum severity and the asset
// - Service changes: title is the service URL, which is also the link
//   when it parses as http(s); body lists the old and new values of
//   whatever changed
// - Log lines: body only
//
// Bodies are wrapped in a `yaml` code block so Discord renders them in a
// monospace box.
//
// ## Delivery
//
// One POST per message, no retries. Pacing between messages and logging of
// failures belong to the core's dispatcher.

use chrono::{SecondsFormat, Utc};
use scopewatch_core::config::NotifyConfig;
use scopewatch_core::model::ChangeEvent;
use scopewatch_core::traits::Notifier;
use scopewatch_core::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Default HTTP timeout for webhook requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Name the webhook posts under
const DEFAULT_USERNAME: &str = "scopewatch";

/// Embed sidebar colour (light blue)
pub const EMBED_COLOR: u32 = 0xADD8E6;

/// Webhook execution payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordMessage {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordEmbed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub color: u32,
    pub timestamp: String,
}

/// Discord webhook notifier
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the notifier renders every message and logs the
/// JSON payload at info level instead of posting it. Nothing leaves the
/// host, and the webhook URL may be empty.
///
/// # Security
///
/// The webhook URL embeds its own credential. The Debug implementation
/// does NOT expose it, and it never appears in log lines or errors.
pub struct DiscordNotifier {
    /// Webhook URL
    /// ⚠️ NEVER log this value
    webhook_url: String,

    username: String,
    avatar_url: Option<String>,

    client: reqwest::Client,

    dry_run: bool,
}

// Custom Debug implementation that hides the webhook URL
impl std::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("webhook_url", &"<REDACTED>")
            .field("username", &self.username)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DiscordNotifier {
    /// Create a new Discord notifier
    ///
    /// # Parameters
    ///
    /// - `webhook_url`: full webhook URL, including its token
    /// - `dry_run`: if true, log payloads instead of posting them
    ///
    /// # Errors
    ///
    /// `Error::Config` when the webhook is empty in live mode, and
    /// `Error::Http` when the HTTP client cannot be built.
    pub fn new(webhook_url: impl Into<String>, dry_run: bool) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.trim().is_empty() && !dry_run {
            return Err(Error::config("Discord webhook URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url,
            username: DEFAULT_USERNAME.to_string(),
            avatar_url: None,
            client,
            dry_run,
        })
    }

    /// Create a notifier that posts to Discord
    pub fn new_live(webhook_url: impl Into<String>) -> Result<Self> {
        Self::new(webhook_url, false)
    }

    /// Create a notifier that only logs what it would post
    pub fn new_dry_run(webhook_url: impl Into<String>) -> Result<Self> {
        Self::new(webhook_url, true)
    }

    /// Create a notifier from the notification configuration
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        Self::new(config.webhook_url.clone(), config.dry_run)
    }

    /// Post under a different bot name
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Post with an avatar image
    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn envelope(&self, embed: DiscordEmbed) -> DiscordMessage {
        DiscordMessage {
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            embeds: vec![embed],
        }
    }

    async fn post(&self, message: &DiscordMessage) -> Result<()> {
        if self.dry_run {
            let payload = serde_json::to_string(message)?;
            tracing::info!("[DRY-RUN] Would post Discord message: {}", payload);
            return Ok(());
        }

        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await
            // reqwest errors carry the URL, which carries the token
            .map_err(|e| Error::notify(format!("Webhook request failed: {}", e.without_url())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        match status.as_u16() {
            401 | 403 | 404 => Err(Error::notify(format!(
                "Webhook rejected the message (invalid or deleted webhook). Status: {}",
                status
            ))),
            429 => Err(Error::notify(format!(
                "Rate limited by Discord. Status: {} - {}",
                status, body
            ))),
            _ => Err(Error::notify(format!(
                "Webhook returned {} - {}",
                status, body
            ))),
        }
    }
}

/// Current time in the format Discord expects for embed timestamps
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn yaml_block(lines: &[String]) -> String {
    let mut body = String::from("```yaml\n");
    for line in lines {
        body.push_str(" - ");
        body.push_str(line);
        body.push('\n');
    }
    body.push_str("```");
    body
}

fn join_set(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn liveness(is_live: bool) -> &'static str {
    if is_live { "up" } else { "down" }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Embed link for `value`, only when Discord will accept it as one
///
/// Dead services are keyed by their bare hostname, which Discord rejects
/// with a 400 when used as an embed URL.
fn link(value: &str) -> Option<String> {
    let url = reqwest::Url::parse(value).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| value.to_string())
}

/// Render the embed for a change event
pub fn render_event(event: &ChangeEvent, timestamp: &str) -> DiscordEmbed {
    let (title, url, lines) = match event {
        ChangeEvent::NewScopeAsset { entry } => (
            non_empty(&entry.program_name),
            link(&entry.program_url),
            vec![
                format!("Max Severity: {}", entry.max_severity),
                format!("Url: {}", entry.asset_identifier),
            ],
        ),
        ChangeEvent::NewLiveService { record } => (
            non_empty(&record.url),
            link(&record.url),
            vec![
                "New Service Is Up".to_string(),
                format!("Title: {}", record.title),
                format!("Status: {}", liveness(record.is_live)),
                format!("Technology: {}", join_set(&record.technologies)),
                format!("Code: {}", record.status_codes.join(" -> ")),
            ],
        ),
        ChangeEvent::ScopeStatusChanged { url, old, new } => (
            non_empty(url),
            link(url),
            vec![
                "Status Change Detected".to_string(),
                format!("Old Status: {}", liveness(*old)),
                format!("New Status: {}", liveness(*new)),
            ],
        ),
        ChangeEvent::StatusCodeChanged { url, old, new } => (
            non_empty(url),
            link(url),
            vec![
                "Status Code Change Detected".to_string(),
                format!("Old Code: {}", old.join(" -> ")),
                format!("New Code: {}", new.join(" -> ")),
            ],
        ),
        ChangeEvent::WordCountChanged { url, old, new } => (
            non_empty(url),
            link(url),
            vec![
                "Word Count Change Detected".to_string(),
                format!("Old Count: {}", old),
                format!("New Count: {}", new),
            ],
        ),
        ChangeEvent::TechnologyChanged { url, old, new } => (
            non_empty(url),
            link(url),
            vec![
                "Technology Change Detected".to_string(),
                format!("Old Techs: {}", join_set(old)),
                format!("New Techs: {}", join_set(new)),
            ],
        ),
        ChangeEvent::TitleChanged { url, old, new } => (
            non_empty(url),
            link(url),
            vec![
                "Title Change Detected".to_string(),
                format!("Old Title: {}", old),
                format!("New Title: {}", new),
            ],
        ),
    };

    DiscordEmbed {
        title,
        description: yaml_block(&lines),
        url,
        color: EMBED_COLOR,
        timestamp: timestamp.to_string(),
    }
}

/// Render the embed for an informational log line
pub fn render_log(message: &str, timestamp: &str) -> DiscordEmbed {
    DiscordEmbed {
        title: None,
        description: yaml_block(&[message.to_string()]),
        url: None,
        color: EMBED_COLOR,
        timestamp: timestamp.to_string(),
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        tracing::debug!("Posting {} for {}", event.kind(), event.key());
        let message = self.envelope(render_event(event, &now_rfc3339()));
        self.post(&message).await
    }

    async fn log(&self, message: &str) -> Result<()> {
        let message = self.envelope(render_log(message, &now_rfc3339()));
        self.post(&message).await
    }

    fn notifier_name(&self) -> &'static str {
        "discord"
    }
}
