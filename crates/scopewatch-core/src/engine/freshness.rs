//! Subdomain freshness reconciliation
//!
//! One cycle enumerates the subdomains of every configured root domain
//! concurrently, probes the combined host list in a single batch, and
//! compares each service's HTTP state with the previous snapshot.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::config::WatchConfig;
use crate::diff::diff_probes;
use crate::engine::{CycleOutcome, CycleReport, Dispatcher, EventSink, Pipeline, PipelineEvent};
use crate::error::{Error, Result};
use crate::model::{ProbeRecord, ProbeResult};
use crate::traits::{Enumerator, Loaded, Prober, SnapshotStore};

const PIPELINE: &str = "freshness";

/// Watches the HTTP state of every subdomain of a set of root domains
pub struct FreshnessWatcher {
    enumerator: Arc<dyn Enumerator>,
    prober: Arc<dyn Prober>,
    store: Arc<dyn SnapshotStore<Vec<ProbeRecord>>>,
    dispatcher: Dispatcher,
    domains: Vec<String>,
    excludes: Arc<HashSet<String>>,
    enumerate_timeout: Duration,
    probe_timeout: Duration,
    dedupe_hostnames: bool,
    events: EventSink,
}

impl FreshnessWatcher {
    /// Create a freshness watcher for `config.freshness.domains`
    pub fn new(
        enumerator: Arc<dyn Enumerator>,
        prober: Arc<dyn Prober>,
        store: Arc<dyn SnapshotStore<Vec<ProbeRecord>>>,
        dispatcher: Dispatcher,
        config: &WatchConfig,
    ) -> Self {
        Self {
            enumerator,
            prober,
            store,
            dispatcher,
            domains: config
                .freshness
                .domains
                .iter()
                .map(|d| d.trim().to_string())
                .collect(),
            excludes: Arc::new(config.excludes.iter().cloned().collect()),
            enumerate_timeout: config.freshness.enumerate_timeout(),
            probe_timeout: config.freshness.probe_timeout(),
            dedupe_hostnames: config.freshness.dedupe_hostnames,
            events: EventSink::disabled(),
        }
    }

    /// Report health events on `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Enumerate every root domain, one task each
    ///
    /// A domain whose enumeration fails or times out contributes nothing;
    /// the others are still probed.
    async fn enumerate_all(&self) -> Result<Vec<String>> {
        let enumerator = Arc::clone(&self.enumerator);
        let excludes = Arc::clone(&self.excludes);
        let timeout = self.enumerate_timeout;
        let inputs = self.domains.iter().map(|d| (d.clone(), d.clone()));

        let aggregate = Aggregator::fan_out(inputs, move |domain: String| {
            let enumerator = Arc::clone(&enumerator);
            let excludes = Arc::clone(&excludes);
            async move {
                let found = match tokio::time::timeout(timeout, enumerator.enumerate(&domain)).await
                {
                    Ok(Ok(found)) => found,
                    Ok(Err(e)) => {
                        warn!("Enumerating {} failed: {}", domain, e);
                        return Vec::new();
                    }
                    Err(_) => {
                        warn!("Enumerating {} timed out after {:?}", domain, timeout);
                        return Vec::new();
                    }
                };

                let hosts: Vec<String> = found
                    .iter()
                    .map(|h| h.trim())
                    .filter(|h| !h.is_empty() && !excludes.contains(*h))
                    .map(str::to_string)
                    .collect();
                debug!("{} yielded {} hostname(s)", domain, hosts.len());
                hosts
            }
        })
        .await?;

        let mut hostnames = aggregate.items;
        if self.dedupe_hostnames {
            let mut seen = HashSet::new();
            hostnames.retain(|h| seen.insert(h.clone()));
        }
        Ok(hostnames)
    }

    async fn probe_all(&self, hostnames: &[String]) -> Result<Vec<ProbeResult>> {
        match tokio::time::timeout(self.probe_timeout, self.prober.probe(hostnames)).await {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(e @ Error::Probe(_))) => Err(e),
            Ok(Err(e)) => Err(Error::probe(e.to_string())),
            Err(_) => Err(Error::probe(format!(
                "{} did not finish {} host(s) within {:?}",
                self.prober.prober_name(),
                hostnames.len(),
                self.probe_timeout
            ))),
        }
    }
}

/// Turn probe output into one record per URL, keeping the last result
fn collapse_by_url(results: Vec<ProbeResult>) -> Vec<ProbeRecord> {
    let mut records: Vec<ProbeRecord> = Vec::with_capacity(results.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in results.into_iter().map(ProbeRecord::from) {
        match index.get(&record.url) {
            Some(&i) => records[i] = record,
            None => {
                index.insert(record.url.clone(), records.len());
                records.push(record);
            }
        }
    }
    records
}

#[async_trait]
impl Pipeline for FreshnessWatcher {
    fn name(&self) -> &'static str {
        PIPELINE
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        if self.domains.is_empty() {
            return Err(Error::config("No root domains configured"));
        }

        let started_at = Utc::now();
        info!("Enumerating {} root domain(s)", self.domains.len());

        let hostnames = self.enumerate_all().await?;
        if hostnames.is_empty() {
            warn!("Enumeration found no hostnames, leaving snapshot untouched");
            return Ok(CycleReport::new(
                PIPELINE,
                CycleOutcome::Skipped,
                0,
                Vec::new(),
                started_at,
            ));
        }

        info!("Probing {} hostname(s)", hostnames.len());
        let results = self.probe_all(&hostnames).await?;
        let current = collapse_by_url(results);
        if current.is_empty() {
            warn!("Probe returned no results, leaving snapshot untouched");
            return Ok(CycleReport::new(
                PIPELINE,
                CycleOutcome::Skipped,
                0,
                Vec::new(),
                started_at,
            ));
        }

        let (outcome, changes) = match self.store.load_or_seed(&current).await? {
            Loaded::Seeded => {
                info!("Freshness baseline created with {} service(s)", current.len());
                self.events.emit(PipelineEvent::Bootstrapped {
                    pipeline: PIPELINE.to_string(),
                    records: current.len(),
                });
                (CycleOutcome::Bootstrapped, Vec::new())
            }
            Loaded::Recovered => {
                self.events.emit(PipelineEvent::Recovered {
                    pipeline: PIPELINE.to_string(),
                    location: self.store.location(),
                });
                (CycleOutcome::Recovered, Vec::new())
            }
            Loaded::Existing(previous) => {
                let changes = diff_probes(&previous, &current);
                self.store.save(&current).await?;
                (CycleOutcome::Compared, changes)
            }
        };

        if changes.is_empty() {
            info!("No service changes");
        } else {
            info!("Detected {} service change(s)", changes.len());
            self.events.emit(PipelineEvent::ChangesDetected {
                pipeline: PIPELINE.to_string(),
                count: changes.len(),
            });
            self.dispatcher.deliver(&changes).await;
        }

        Ok(CycleReport::new(
            PIPELINE,
            outcome,
            current.len(),
            changes,
            started_at,
        ))
    }
}
