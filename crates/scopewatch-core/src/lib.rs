// # scopewatch-core
//
// Change-detection and state-reconciliation engine behind scopewatch.
//
// ## Architecture Overview
//
// Two independent pipelines run on their own intervals:
// - **ScopeWatcher**: pulls the bounty program scope feed and reports
//   in-scope assets that were never seen before
// - **FreshnessWatcher**: enumerates subdomains of configured root domains,
//   probes them over HTTP and reports services whose state changed
//
// Both follow the same cycle: fan out enrichment work, join at a barrier,
// compare with the persisted snapshot, overwrite the snapshot, notify.
//
// Collaborators sit behind traits so the engine never shells out or opens a
// socket itself:
// - **ScopeFeed**: fetches the raw feed document
// - **Enumerator**: lists subdomains of one root domain
// - **Prober**: probes a batch of hostnames
// - **Notifier**: delivers change notifications
// - **SnapshotStore**: keeps the last observation of each pipeline
//
// ## Design Principles
//
// 1. **Library-First**: the daemon only wires configuration and adapters
// 2. **Pure comparison**: diffing is a pure function over two snapshots
// 3. **No shared accumulators**: enrichment tasks return batches
// 4. **Crash-safe persistence**: snapshots are replaced atomically

pub mod aggregator;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use aggregator::{Aggregate, Aggregator};
pub use config::{FailurePolicy, OverlapPolicy, WatchConfig};
pub use engine::{
    CycleOutcome, CycleReport, Dispatcher, EventSink, FreshnessWatcher, Pipeline, PipelineEvent,
    ScopeWatcher,
};
pub use error::{Error, Result};
pub use model::{ChangeEvent, ProbeRecord, ProbeResult, ScopeEntry};
pub use scheduler::Scheduler;
pub use state::{FileSnapshotStore, MemorySnapshotStore};
pub use traits::{Enumerator, Notifier, Prober, ScopeFeed, SnapshotStore};
