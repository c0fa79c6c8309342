//! Scope feed reconciliation
//!
//! One cycle pulls the bounty program feed, extracts the monitored in-scope
//! assets of every program concurrently, compares their identifiers with the
//! previous snapshot and reports assets that were never seen before.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::config::WatchConfig;
use crate::diff::{ScopePolicy, diff_scope};
use crate::engine::{CycleOutcome, CycleReport, Dispatcher, EventSink, Pipeline, PipelineEvent};
use crate::error::{Error, Result};
use crate::model::{Program, ScopeEntry, decode_programs};
use crate::traits::{Loaded, ScopeFeed, SnapshotStore};

const PIPELINE: &str = "scope";

/// Watches the bounty program scope feed for new assets
pub struct ScopeWatcher {
    feed: Arc<dyn ScopeFeed>,
    store: Arc<dyn SnapshotStore<Vec<String>>>,
    dispatcher: Dispatcher,
    policy: ScopePolicy,
    excludes: Arc<HashSet<String>>,
    fetch_timeout: Duration,
    events: EventSink,
}

impl ScopeWatcher {
    /// Create a scope watcher
    ///
    /// # Parameters
    ///
    /// - `feed`: where the program list comes from
    /// - `store`: snapshot of previously seen identifiers
    /// - `dispatcher`: where changes go
    /// - `config`: VDP gate, exclusions and fetch timeout are read from here
    pub fn new(
        feed: Arc<dyn ScopeFeed>,
        store: Arc<dyn SnapshotStore<Vec<String>>>,
        dispatcher: Dispatcher,
        config: &WatchConfig,
    ) -> Self {
        Self {
            feed,
            store,
            dispatcher,
            policy: ScopePolicy {
                include_vdp: config.scope.include_vdp,
            },
            excludes: Arc::new(config.excludes.iter().cloned().collect()),
            fetch_timeout: config.scope.fetch_timeout(),
            events: EventSink::disabled(),
        }
    }

    /// Report health events on `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    async fn fetch_programs(&self) -> Result<Vec<Program>> {
        let payload = match tokio::time::timeout(self.fetch_timeout, self.feed.fetch()).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(e @ Error::Feed(_))) => return Err(e),
            Ok(Err(e)) => return Err(Error::feed(e.to_string())),
            Err(_) => {
                return Err(Error::feed(format!(
                    "{} did not answer within {:?}",
                    self.feed.feed_name(),
                    self.fetch_timeout
                )));
            }
        };

        debug!("Fetched {} bytes from {}", payload.len(), self.feed.feed_name());
        decode_programs(&payload)
    }

    /// Extract monitored entries, one task per program
    async fn collect_entries(&self, programs: Vec<Program>) -> Result<Vec<ScopeEntry>> {
        let excludes = Arc::clone(&self.excludes);
        let inputs = programs.into_iter().map(|p| (p.name.clone(), p));

        let aggregate = Aggregator::fan_out(inputs, move |program: Program| {
            let excludes = Arc::clone(&excludes);
            async move {
                program
                    .scope_entries()
                    .filter(|entry| entry.is_monitored())
                    .filter(|entry| !excludes.contains(&entry.asset_identifier))
                    .collect::<Vec<_>>()
            }
        })
        .await?;

        debug!(
            "{} program(s) contributed {} monitored asset(s)",
            aggregate.tasks,
            aggregate.items.len()
        );
        Ok(aggregate.items)
    }
}

#[async_trait]
impl Pipeline for ScopeWatcher {
    fn name(&self) -> &'static str {
        PIPELINE
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        let started_at = Utc::now();
        self.dispatcher.log("Scope inspection started").await;

        let programs = self.fetch_programs().await?;
        info!("Scope feed lists {} program(s)", programs.len());

        let entries = self.collect_entries(programs).await?;
        let keys: Vec<String> = entries
            .iter()
            .map(|e| e.asset_identifier.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if keys.is_empty() {
            warn!("Scope feed yielded no monitored assets, leaving snapshot untouched");
            return Ok(CycleReport::new(
                PIPELINE,
                CycleOutcome::Skipped,
                0,
                Vec::new(),
                started_at,
            ));
        }

        let (outcome, changes) = match self.store.load_or_seed(&keys).await? {
            Loaded::Seeded => {
                info!("Scope baseline created with {} asset(s)", keys.len());
                self.events.emit(PipelineEvent::Bootstrapped {
                    pipeline: PIPELINE.to_string(),
                    records: keys.len(),
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
                let changes = diff_scope(&previous, &entries, &self.policy);
                self.store.save(&keys).await?;
                (CycleOutcome::Compared, changes)
            }
        };

        if changes.is_empty() {
            info!("No new scope assets");
            self.dispatcher.log("No new in-scope assets").await;
        } else {
            info!("Found {} new scope asset(s)", changes.len());
            self.events.emit(PipelineEvent::ChangesDetected {
                pipeline: PIPELINE.to_string(),
                count: changes.len(),
            });
            self.dispatcher
                .log(&format!("Found {} new in-scope asset(s)", changes.len()))
                .await;
            self.dispatcher.deliver(&changes).await;
        }

        Ok(CycleReport::new(
            PIPELINE,
            outcome,
            keys.len(),
            changes,
            started_at,
        ))
    }
}
