//! Core traits for scopewatch
//!
//! This module defines the abstract interfaces the reconciliation engine
//! depends on.
//!
//! - [`ScopeFeed`]: Fetch the upstream scope feed
//! - [`Enumerator`]: Enumerate subdomains of a root domain
//! - [`Prober`]: Probe a batch of hostnames over HTTP
//! - [`Notifier`]: Deliver change notifications
//! - [`SnapshotStore`]: Durable per-pipeline snapshot

pub mod enumerator;
pub mod notifier;
pub mod prober;
pub mod scope_feed;
pub mod snapshot_store;

pub use enumerator::Enumerator;
pub use notifier::Notifier;
pub use prober::Prober;
pub use scope_feed::ScopeFeed;
pub use snapshot_store::{Loaded, Snapshot, SnapshotStore};
