//! Test doubles and common utilities for contract tests
//!
//! Every double counts its calls so tests can assert how often the engine
//! reached each collaborator.

#![allow(dead_code)]

use async_trait::async_trait;
use scopewatch_core::engine::{CycleOutcome, CycleReport, Pipeline};
use scopewatch_core::error::{Error, Result};
use scopewatch_core::model::{ChangeEvent, ProbeResult};
use scopewatch_core::traits::{Enumerator, Notifier, Prober, ScopeFeed};
use scopewatch_core::{Dispatcher, WatchConfig};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A feed returning whatever payload is currently loaded
#[derive(Clone)]
pub struct StaticFeed {
    payload: Arc<Mutex<std::result::Result<Vec<u8>, String>>>,
    fetch_count: Arc<AtomicUsize>,
}

impl StaticFeed {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Arc::new(Mutex::new(Ok(payload.into()))),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the payload served by the next fetch
    pub fn set(&self, payload: impl Into<Vec<u8>>) {
        *self.payload.lock().unwrap() = Ok(payload.into());
    }

    /// Make the next fetch fail
    pub fn fail(&self, message: &str) {
        *self.payload.lock().unwrap() = Err(message.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScopeFeed for StaticFeed {
    async fn fetch(&self) -> Result<Vec<u8>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.payload.lock().unwrap().clone().map_err(Error::feed)
    }

    fn feed_name(&self) -> &'static str {
        "static"
    }
}

/// One in-scope asset for [`feed_json`]
pub struct Asset<'a> {
    pub id: &'a str,
    pub asset_type: &'a str,
    pub submission: bool,
    pub bounty: bool,
}

impl<'a> Asset<'a> {
    /// A bounty-eligible URL asset
    pub fn url(id: &'a str) -> Self {
        Self {
            id,
            asset_type: "URL",
            submission: true,
            bounty: true,
        }
    }

    /// A URL asset that is only part of a disclosure program
    pub fn vdp(id: &'a str) -> Self {
        Self {
            bounty: false,
            ..Self::url(id)
        }
    }
}

/// Build a feed document with one program per `(name, assets)` pair
pub fn feed_json(programs: &[(&str, Vec<Asset<'_>>)]) -> Vec<u8> {
    let programs: Vec<_> = programs
        .iter()
        .map(|(name, assets)| {
            json!({
                "name": name,
                "url": format!("https://hackerone.com/{}", name.to_lowercase()),
                "handle": name.to_lowercase(),
                "offers_bounties": true,
                "targets": {
                    "in_scope": assets.iter().map(|a| json!({
                        "asset_identifier": a.id,
                        "asset_type": a.asset_type,
                        "eligible_for_submission": a.submission,
                        "eligible_for_bounty": a.bounty,
                        "max_severity": "critical",
                    })).collect::<Vec<_>>(),
                    "out_of_scope": [],
                }
            })
        })
        .collect();
    serde_json::to_vec(&programs).unwrap()
}

/// Enumerator answering from a fixed domain → hostnames map
///
/// Domains missing from the map fail enumeration.
#[derive(Clone, Default)]
pub struct MapEnumerator {
    answers: Arc<Mutex<HashMap<String, Vec<String>>>>,
    delay: Duration,
    call_count: Arc<AtomicUsize>,
}

impl MapEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, domain: &str, hosts: &[&str]) -> Self {
        self.answer(domain, hosts);
        self
    }

    /// Replace the answer for `domain`, visible to every clone
    pub fn answer(&self, domain: &str, hosts: &[&str]) {
        self.answers.lock().unwrap().insert(
            domain.to_string(),
            hosts.iter().map(|h| h.to_string()).collect(),
        );
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enumerator for MapEnumerator {
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answers
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .ok_or_else(|| Error::enumerate(format!("unknown domain {}", domain)))
    }

    fn enumerator_name(&self) -> &'static str {
        "map"
    }
}

/// Prober answering from a hostname → result map
///
/// Hostnames missing from the map come back as failed probes. Every batch
/// it receives is recorded.
#[derive(Clone, Default)]
pub struct RecordingProber {
    answers: Arc<Mutex<HashMap<String, ProbeResult>>>,
    batches: Arc<Mutex<Vec<Vec<String>>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl RecordingProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `host` with a live service
    pub fn live(&self, host: &str, title: &str, codes: &[&str], words: u64, tech: &[&str]) {
        self.answers.lock().unwrap().insert(
            host.to_string(),
            ProbeResult {
                input: host.to_string(),
                url: format!("https://{}", host),
                title: title.to_string(),
                technologies: tech.iter().map(|t| t.to_string()).collect(),
                status_codes: codes.iter().map(|c| c.to_string()).collect(),
                word_count: words,
                succeeded: true,
            },
        );
    }

    /// Answer `host` with a failed probe that still knows its URL
    pub fn down(&self, host: &str) {
        self.answers.lock().unwrap().insert(
            host.to_string(),
            ProbeResult {
                input: host.to_string(),
                url: format!("https://{}", host),
                succeeded: false,
                ..ProbeResult::default()
            },
        );
    }

    /// Make every following batch fail
    pub fn fail(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for RecordingProber {
    async fn probe(&self, hostnames: &[String]) -> Result<Vec<ProbeResult>> {
        self.batches.lock().unwrap().push(hostnames.to_vec());

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(Error::probe(message));
        }

        let answers = self.answers.lock().unwrap();
        Ok(hostnames
            .iter()
            .map(|host| {
                answers.get(host).cloned().unwrap_or_else(|| ProbeResult {
                    input: host.clone(),
                    succeeded: false,
                    ..ProbeResult::default()
                })
            })
            .collect())
    }

    fn prober_name(&self) -> &'static str {
        "recording"
    }
}

/// Notifier that remembers everything it was asked to send
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
    logs: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.logs.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn log(&self, message: &str) -> Result<()> {
        self.logs.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// Configuration with no pacing between messages
pub fn test_config() -> WatchConfig {
    let mut config = WatchConfig::new();
    config.notify.webhook_url = "https://hooks.example/test".to_string();
    config.notify.message_delay_secs = 0;
    config
}

/// Dispatcher delivering into `notifier` without pacing
pub fn dispatcher(notifier: &RecordingNotifier, config: &WatchConfig) -> Dispatcher {
    Dispatcher::new(Arc::new(notifier.clone()), &config.notify)
}

/// Pipeline whose cycles take a fixed time and can be made to fail
pub struct SlowPipeline {
    name: &'static str,
    duration: Duration,
    error: Option<fn() -> Error>,
    started: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl SlowPipeline {
    pub fn new(name: &'static str, duration: Duration) -> Self {
        Self {
            name,
            duration,
            error: None,
            started: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every cycle with the error `make` builds
    pub fn failing(mut self, make: fn() -> Error) -> Self {
        self.error = Some(make);
        self
    }

    pub fn started(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.started)
    }

    pub fn max_running(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_running)
    }
}

#[async_trait]
impl Pipeline for SlowPipeline {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        let started_at = chrono::Utc::now();
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        tokio::time::sleep(self.duration).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(make) = self.error {
            return Err(make());
        }

        Ok(CycleReport {
            pipeline: self.name,
            outcome: CycleOutcome::Compared,
            records: 0,
            changes: Vec::new(),
            started_at,
            finished_at: chrono::Utc::now(),
        })
    }
}
