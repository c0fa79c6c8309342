//! Reconciliation pipelines
//!
//! A pipeline observes some external state, compares it with what it saw
//! last time, persists the new observation and reports the differences.
//! Two pipelines exist:
//!
//! - [`ScopeWatcher`]: bounty program scope feed
//! - [`FreshnessWatcher`]: subdomain enumeration followed by HTTP probing
//!
//! ## Architecture
//!
//! ```text
//!   ScopeFeed / Enumerator+Prober
//!               │
//!               ▼
//!   ┌──────────────────────┐     fan-out per program / root domain
//!   │      Aggregator      │◄─── one batch per task, joined at a barrier
//!   └──────────────────────┘
//!               │
//!               ▼
//!   ┌──────────────────────┐     ┌──────────────┐
//!   │ SnapshotStore::load  │────►│    Differ    │
//!   └──────────────────────┘     └──────────────┘
//!               │                       │
//!               ▼                       ▼
//!   ┌──────────────────────┐     ┌──────────────┐
//!   │ SnapshotStore::save  │     │  Dispatcher  │──► Notifier
//!   └──────────────────────┘     └──────────────┘
//! ```
//!
//! Both pipelines report progress as [`PipelineEvent`] values on a bounded
//! channel so an embedding application can watch their health.

pub mod dispatch;
pub mod freshness;
pub mod scope;

pub use dispatch::Dispatcher;
pub use freshness::FreshnessWatcher;
pub use scope::ScopeWatcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Result;
use crate::model::ChangeEvent;

/// Health events emitted by pipelines and the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A cycle has been started by the scheduler
    CycleStarted { pipeline: String },

    /// No usable snapshot existed; the current data became the baseline
    Bootstrapped { pipeline: String, records: usize },

    /// The snapshot was unreadable and has been replaced
    Recovered { pipeline: String, location: String },

    /// The comparison found reportable changes
    ChangesDetected { pipeline: String, count: usize },

    /// A cycle ran to completion
    CycleCompleted { pipeline: String, changes: usize },

    /// A cycle failed
    CycleFailed {
        pipeline: String,
        error: String,
        fatal: bool,
    },
}

/// How the snapshot was used in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First run; the observation was saved as the baseline
    Bootstrapped,
    /// Corrupted snapshot replaced with the observation
    Recovered,
    /// Observation compared with the previous snapshot and saved
    Compared,
    /// Nothing was observed; the snapshot was left untouched
    Skipped,
}

/// Summary of one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub pipeline: &'static str,
    pub outcome: CycleOutcome,
    /// Records in the new observation
    pub records: usize,
    /// Changes that were dispatched
    pub changes: Vec<ChangeEvent>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    pub(crate) fn new(
        pipeline: &'static str,
        outcome: CycleOutcome,
        records: usize,
        changes: Vec<ChangeEvent>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pipeline,
            outcome,
            records,
            changes,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// One reconciliation pipeline
///
/// Implementations run a complete observe/compare/persist/notify cycle per
/// call. The scheduler decides when, and whether cycles may overlap.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Stable name for logs and health events
    fn name(&self) -> &'static str;

    /// Run one complete cycle
    ///
    /// # Errors
    ///
    /// Any error aborts the cycle. Whether it is fatal is decided by
    /// [`Error::is_fatal`](crate::Error::is_fatal) and the scheduler's
    /// failure policy.
    async fn run_cycle(&self) -> Result<CycleReport>;
}

/// Sending half of the health event channel
///
/// Cloning is cheap. Events are dropped (with a warning) when the channel is
/// full so a slow consumer never stalls a cycle.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventSink {
    /// Create a sink and the receiver an application reads from
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit a health event
    pub fn emit(&self, event: PipelineEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        if let Err(mpsc::error::TrySendError::Full(dropped)) = tx.try_send(event) {
            warn!(
                "Event channel full, dropping {:?}. Consider increasing event_channel_capacity.",
                dropped
            );
        }
    }
}
