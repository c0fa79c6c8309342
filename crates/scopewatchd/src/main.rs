// # scopewatchd - scopewatch daemon
//
// The daemon is a thin integration layer. It:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Wires the feed, recon tools, snapshot files and Discord notifier into
//    the two reconciliation pipelines
// 4. Runs the scheduler until a signal or a fatal error
//
// Detection, persistence and scheduling logic all live in scopewatch-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Notifications
// - `SCOPEWATCH_WEBHOOK`: Discord webhook URL (required unless dry run)
// - `SCOPEWATCH_LOG`: also post progress messages (true/false)
// - `SCOPEWATCH_DRY_RUN`: log messages instead of posting them
//
// ### Scope pipeline
// - `SCOPEWATCH_FEED_URL`: program list to watch (defaults to the public
//   HackerOne dump)
// - `SCOPEWATCH_VDP`: also report assets without a bounty
// - `SCOPEWATCH_EXCLUDE`: comma-separated identifiers to ignore
//
// ### Freshness pipeline
// - `SCOPEWATCH_DOMAINS`: comma-separated root domains (pipeline is off
//   when unset)
// - `SCOPEWATCH_SUBFINDER_BIN`: subfinder executable (default: `subfinder`)
// - `SCOPEWATCH_HTTPX_BIN`: httpx executable (default: `httpx`)
//
// ### Scheduling
// - `SCOPEWATCH_DELAY_MINUTES`: freshness period; the scope pipeline runs
//   three minutes slower (default: 10)
// - `SCOPEWATCH_RUN_ON_START`: run both pipelines immediately
// - `SCOPEWATCH_OVERLAP`: `serialize` (default) or `allow`
// - `SCOPEWATCH_ON_FAILURE`: `exit` (default) or `retry`
//
// ### Storage and logging
// - `SCOPEWATCH_DATA_DIR`: directory for `Scopes.json` and `Subs.json`
//   (default: `data`)
// - `SCOPEWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export SCOPEWATCH_WEBHOOK=https://discord.com/api/webhooks/123/abc
// export SCOPEWATCH_DOMAINS=example.com,example.org
// export SCOPEWATCH_DATA_DIR=/var/lib/scopewatch
//
// scopewatchd
// ```

use anyhow::{Context, Result};
use scopewatch_core::traits::Notifier;
use scopewatch_core::{
    Dispatcher, EventSink, FailurePolicy, FileSnapshotStore, FreshnessWatcher, OverlapPolicy,
    PipelineEvent, ProbeRecord, Scheduler, ScopeWatcher, WatchConfig,
};
use scopewatch_feed_http::HttpScopeFeed;
use scopewatch_notify_discord::DiscordNotifier;
use scopewatch_recon::{HttpxProber, SubfinderEnumerator};
use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (fatal cycle failure)
#[derive(Debug, Clone, Copy)]
enum WatchExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<WatchExitCode> for ExitCode {
    fn from(code: WatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    webhook_url: String,
    log_notifications: bool,
    dry_run: bool,
    feed_url: Option<String>,
    include_vdp: bool,
    excludes: Vec<String>,
    domains: Vec<String>,
    subfinder_bin: String,
    httpx_bin: String,
    delay_minutes: u64,
    run_on_start: bool,
    overlap: OverlapPolicy,
    on_failure: FailurePolicy,
    data_dir: PathBuf,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            webhook_url: var("SCOPEWATCH_WEBHOOK").unwrap_or_default(),
            log_notifications: flag("SCOPEWATCH_LOG")?,
            dry_run: flag("SCOPEWATCH_DRY_RUN")?,
            feed_url: var("SCOPEWATCH_FEED_URL"),
            include_vdp: flag("SCOPEWATCH_VDP")?,
            excludes: parse_list(&var("SCOPEWATCH_EXCLUDE").unwrap_or_default()),
            domains: parse_list(&var("SCOPEWATCH_DOMAINS").unwrap_or_default()),
            subfinder_bin: var("SCOPEWATCH_SUBFINDER_BIN")
                .unwrap_or_else(|| "subfinder".to_string()),
            httpx_bin: var("SCOPEWATCH_HTTPX_BIN").unwrap_or_else(|| "httpx".to_string()),
            delay_minutes: match var("SCOPEWATCH_DELAY_MINUTES") {
                Some(raw) => raw.parse().with_context(|| {
                    format!("SCOPEWATCH_DELAY_MINUTES must be a whole number. Got: {}", raw)
                })?,
                None => 10,
            },
            run_on_start: flag("SCOPEWATCH_RUN_ON_START")?,
            overlap: match var("SCOPEWATCH_OVERLAP") {
                Some(raw) => parse_overlap(&raw)?,
                None => OverlapPolicy::default(),
            },
            on_failure: match var("SCOPEWATCH_ON_FAILURE") {
                Some(raw) => parse_failure_policy(&raw)?,
                None => FailurePolicy::default(),
            },
            data_dir: var("SCOPEWATCH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            log_level: var("SCOPEWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks what the core cannot know about: URL schemes, domain syntax,
    /// the interval range and the log level.
    fn validate(&self) -> Result<()> {
        if !self.dry_run {
            if self.webhook_url.is_empty() {
                anyhow::bail!(
                    "SCOPEWATCH_WEBHOOK is required. \
                    Set it via: export SCOPEWATCH_WEBHOOK=https://discord.com/api/webhooks/..."
                );
            }
            if !self.webhook_url.starts_with("https://") && !self.webhook_url.starts_with("http://")
            {
                // Don't echo the value, it is a credential
                anyhow::bail!("SCOPEWATCH_WEBHOOK must be an HTTP or HTTPS URL");
            }
        }

        if let Some(ref url) = self.feed_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            anyhow::bail!(
                "SCOPEWATCH_FEED_URL must use HTTP or HTTPS scheme. Got: {}",
                url
            );
        }

        for domain in &self.domains {
            validate_domain_name(domain)?;
        }

        if !(1..=1440).contains(&self.delay_minutes) {
            anyhow::bail!(
                "SCOPEWATCH_DELAY_MINUTES must be between 1 and 1440. Got: {}",
                self.delay_minutes
            );
        }

        if self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("SCOPEWATCH_DATA_DIR cannot be empty");
        }

        parse_log_level(&self.log_level)?;

        Ok(())
    }

    /// Translate into the core configuration
    fn watch_config(&self) -> WatchConfig {
        let mut watch = WatchConfig::new();

        if let Some(ref url) = self.feed_url {
            watch.scope.feed_url = url.clone();
        }
        watch.scope.state_path = self.data_dir.join("Scopes.json");
        watch.scope.include_vdp = self.include_vdp;

        watch.freshness.domains = self.domains.clone();
        watch.freshness.state_path = self.data_dir.join("Subs.json");

        watch.notify.webhook_url = self.webhook_url.clone();
        watch.notify.log_notifications = self.log_notifications;
        watch.notify.dry_run = self.dry_run;

        watch.schedule.interval_minutes = self.delay_minutes;
        watch.schedule.run_on_start = self.run_on_start;
        watch.schedule.overlap = self.overlap;
        watch.schedule.on_failure = self.on_failure;

        watch.excludes = self.excludes.clone();
        watch
    }
}

/// Read a variable, treating empty values as unset
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(name: &str) -> Result<bool> {
    match var(name) {
        Some(raw) => parse_flag(&raw).with_context(|| format!("Invalid value for {}", name)),
        None => Ok(false),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false, got '{}'", raw),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_overlap(raw: &str) -> Result<OverlapPolicy> {
    match raw.to_lowercase().as_str() {
        "serialize" => Ok(OverlapPolicy::Serialize),
        "allow" => Ok(OverlapPolicy::Allow),
        _ => anyhow::bail!(
            "SCOPEWATCH_OVERLAP '{}' is not valid. Valid values: serialize, allow",
            raw
        ),
    }
}

fn parse_failure_policy(raw: &str) -> Result<FailurePolicy> {
    match raw.to_lowercase().as_str() {
        "exit" => Ok(FailurePolicy::Exit),
        "retry" | "retry_next_tick" => Ok(FailurePolicy::RetryNextTick),
        _ => anyhow::bail!(
            "SCOPEWATCH_ON_FAILURE '{}' is not valid. Valid values: exit, retry",
            raw
        ),
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "SCOPEWATCH_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks. It's not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return WatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return WatchExitCode::ConfigError.into();
    }

    let watch = config.watch_config();
    if let Err(e) = watch.validate() {
        eprintln!("Configuration validation error: {}", e);
        return WatchExitCode::ConfigError.into();
    }

    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WatchExitCode::ConfigError.into();
    }

    info!("Starting scopewatchd");
    info!(
        "Configuration loaded: {} root domain(s), {} exclusion(s), data in {}",
        config.domains.len(),
        config.excludes.len(),
        config.data_dir.display()
    );
    if config.dry_run {
        warn!("Dry-run mode: notifications are logged, not posted");
    }

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!(
            "Failed to create data directory {}: {}",
            config.data_dir.display(),
            e
        );
        return WatchExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(&config, watch).await {
            error!("Daemon error: {:#}", e);
            WatchExitCode::RuntimeError
        } else {
            WatchExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build both pipelines and run the scheduler until shutdown
async fn run_daemon(config: &Config, watch: WatchConfig) -> Result<()> {
    let notifier: Arc<dyn Notifier> = Arc::new(
        DiscordNotifier::from_config(&watch.notify).context("Failed to create Discord notifier")?,
    );
    let dispatcher = Dispatcher::new(notifier, &watch.notify);

    let (events, mut event_rx) = EventSink::channel(watch.event_channel_capacity);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            log_event(&event);
        }
    });

    let mut scheduler = Scheduler::new(&watch.schedule).with_events(events.clone());

    let feed = HttpScopeFeed::from_config(&watch.scope).context("Failed to create scope feed")?;
    info!("Watching scope feed {}", feed.url());
    let scope = ScopeWatcher::new(
        Arc::new(feed),
        Arc::new(FileSnapshotStore::<Vec<String>>::new(&watch.scope.state_path)),
        dispatcher.clone(),
        &watch,
    )
    .with_events(events.clone());
    scheduler.add(Arc::new(scope), watch.schedule.scope_interval());

    if watch.freshness.is_enabled() {
        for domain in &watch.freshness.domains {
            info!("Watching subdomains of {}", domain);
        }
        let freshness = FreshnessWatcher::new(
            Arc::new(SubfinderEnumerator::with_binary(&config.subfinder_bin)),
            Arc::new(HttpxProber::with_binary(&config.httpx_bin)),
            Arc::new(FileSnapshotStore::<Vec<ProbeRecord>>::new(
                &watch.freshness.state_path,
            )),
            dispatcher.clone(),
            &watch,
        )
        .with_events(events);
        scheduler.add(Arc::new(freshness), watch.schedule.freshness_interval());
    } else {
        info!("No root domains configured, freshness pipeline disabled");
    }

    let shutdown = shutdown_signal()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let signal = shutdown.await;
        info!("Received shutdown signal: {}", signal);
        let _ = shutdown_tx.send(());
    });

    dispatcher.log("monitoring started").await;
    info!(
        "Scheduler running {} pipeline(s), first cycle {}",
        scheduler.len(),
        if watch.schedule.run_on_start {
            "now".to_string()
        } else {
            format!("in {} minute(s)", watch.schedule.interval_minutes)
        }
    );

    scheduler.run_with_shutdown(Some(shutdown_rx)).await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Log a pipeline health event at a level that matches its severity
fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::CycleStarted { pipeline } => debug!("[{}] cycle started", pipeline),
        PipelineEvent::Bootstrapped { pipeline, records } => {
            info!("[{}] baseline recorded with {} entries", pipeline, records)
        }
        PipelineEvent::Recovered { pipeline, location } => {
            warn!("[{}] snapshot {} was unreadable and was reset", pipeline, location)
        }
        PipelineEvent::ChangesDetected { pipeline, count } => {
            info!("[{}] {} change(s) detected", pipeline, count)
        }
        PipelineEvent::CycleCompleted { pipeline, changes } => {
            debug!("[{}] cycle completed with {} change(s)", pipeline, changes)
        }
        PipelineEvent::CycleFailed {
            pipeline,
            error,
            fatal,
        } => {
            if *fatal {
                error!("[{}] cycle failed: {}", pipeline, error)
            } else {
                warn!("[{}] cycle failed: {}", pipeline, error)
            }
        }
    }
}

/// Resolve on SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Resolve on Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    })
}
