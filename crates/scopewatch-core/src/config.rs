//! Configuration types for scopewatch
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the upstream scope feed
pub const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/arkadiyt/bounty-targets-data/main/data/hackerone_data.json";

/// Main scopewatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Scope feed pipeline
    #[serde(default)]
    pub scope: ScopeConfig,

    /// Subdomain freshness pipeline
    #[serde(default)]
    pub freshness: FreshnessConfig,

    /// Notification delivery
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Cycle timing
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Identifiers ignored by both pipelines
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Capacity of the pipeline health event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl WatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            scope: ScopeConfig::default(),
            freshness: FreshnessConfig::default(),
            notify: NotifyConfig::default(),
            schedule: ScheduleConfig::default(),
            excludes: Vec::new(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.scope.validate()?;
        self.freshness.validate()?;
        self.notify.validate()?;
        self.schedule.validate()?;

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope feed pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// URL the feed is pulled from
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Snapshot file of previously seen identifiers
    #[serde(default = "default_scope_state_path")]
    pub state_path: PathBuf,

    /// Also report assets that are not eligible for bounty
    #[serde(default)]
    pub include_vdp: bool,

    /// Upper bound on one feed fetch (in seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl ScopeConfig {
    /// Validate the scope configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.feed_url.is_empty() {
            return Err(crate::Error::config("Scope feed URL cannot be empty"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("Feed fetch timeout must be > 0"));
        }
        Ok(())
    }

    /// Feed fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            state_path: default_scope_state_path(),
            include_vdp: false,
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

/// Subdomain freshness pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Root domains to enumerate
    ///
    /// Empty disables the pipeline.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Snapshot file of probe records
    #[serde(default = "default_freshness_state_path")]
    pub state_path: PathBuf,

    /// Upper bound on enumerating one root domain (in seconds)
    #[serde(default = "default_enumerate_timeout_secs")]
    pub enumerate_timeout_secs: u64,

    /// Upper bound on the whole probe batch (in seconds)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Probe a hostname once even if several root domains yield it
    #[serde(default = "default_true")]
    pub dedupe_hostnames: bool,
}

impl FreshnessConfig {
    /// Whether any root domain is configured
    pub fn is_enabled(&self) -> bool {
        !self.domains.is_empty()
    }

    /// Validate the freshness configuration
    ///
    /// An empty domain list is valid here (the pipeline is simply not
    /// scheduled); blank entries are not.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domains.iter().any(|d| d.trim().is_empty()) {
            return Err(crate::Error::config("Root domains cannot be blank"));
        }
        if self.enumerate_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(crate::Error::config("Recon timeouts must be > 0"));
        }
        Ok(())
    }

    pub fn enumerate_timeout(&self) -> Duration {
        Duration::from_secs(self.enumerate_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            state_path: default_freshness_state_path(),
            enumerate_timeout_secs: default_enumerate_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            dedupe_hostnames: true,
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook notifications are posted to
    #[serde(default)]
    pub webhook_url: String,

    /// Also send informational progress messages
    #[serde(default)]
    pub log_notifications: bool,

    /// Pause between consecutive messages (in seconds)
    #[serde(default = "default_message_delay_secs")]
    pub message_delay_secs: u64,

    /// Log payloads instead of sending them
    #[serde(default)]
    pub dry_run: bool,
}

impl NotifyConfig {
    /// Validate the notification configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.webhook_url.is_empty() && !self.dry_run {
            return Err(crate::Error::config("Webhook URL cannot be empty"));
        }
        Ok(())
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_secs(self.message_delay_secs)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            log_notifications: false,
            message_delay_secs: default_message_delay_secs(),
            dry_run: false,
        }
    }
}

/// What happens when a tick fires while the previous cycle still runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Skip the tick; one cycle per pipeline at a time
    #[default]
    Serialize,
    /// Start another cycle anyway
    Allow,
}

/// What happens when a cycle fails with a fatal-class error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the scheduler and surface the error
    #[default]
    Exit,
    /// Log it and try again on the next tick
    RetryNextTick,
}

/// Cycle timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Freshness pipeline period (in minutes)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Extra minutes added to the scope pipeline period
    #[serde(default = "default_scope_offset_minutes")]
    pub scope_offset_minutes: u64,

    /// Run a cycle immediately instead of one period after start
    #[serde(default)]
    pub run_on_start: bool,

    #[serde(default)]
    pub overlap: OverlapPolicy,

    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl ScheduleConfig {
    /// Validate the schedule configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_minutes == 0 {
            return Err(crate::Error::config("Interval must be > 0 minutes"));
        }
        Ok(())
    }

    /// Period of the freshness pipeline
    pub fn freshness_interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// Period of the scope pipeline
    pub fn scope_interval(&self) -> Duration {
        Duration::from_secs((self.interval_minutes + self.scope_offset_minutes) * 60)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            scope_offset_minutes: default_scope_offset_minutes(),
            run_on_start: false,
            overlap: OverlapPolicy::default(),
            on_failure: FailurePolicy::default(),
        }
    }
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_scope_state_path() -> PathBuf {
    PathBuf::from("data/Scopes.json")
}

fn default_freshness_state_path() -> PathBuf {
    PathBuf::from("data/Subs.json")
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_enumerate_timeout_secs() -> u64 {
    600
}

fn default_probe_timeout_secs() -> u64 {
    1800
}

fn default_message_delay_secs() -> u64 {
    2
}

fn default_interval_minutes() -> u64 {
    10
}

fn default_scope_offset_minutes() -> u64 {
    3
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_true() -> bool {
    true
}
