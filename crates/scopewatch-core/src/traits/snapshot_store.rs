// # Snapshot Store Trait
//
// Defines the interface for the durable "what we saw last time" snapshot
// each pipeline keeps.
//
// ## Purpose
//
// A snapshot is read at the start of a comparison and fully overwritten at
// the end of every cycle. Writes are whole-value rewrites, never merges.
//
// ## Implementations
//
// - File-based: one JSON document per pipeline (`FileSnapshotStore`)
// - In-memory: tests and ephemeral runs (`MemorySnapshotStore`)
//
// ## Usage
//
// ```rust,ignore
// use scopewatch_core::traits::{Loaded, SnapshotStore};
//
// let fresh: Vec<String> = current_keys();
// match store.load_or_seed(&fresh).await? {
//     Loaded::Existing(previous) => diff(previous, &fresh),
//     Loaded::Seeded | Loaded::Recovered => { /* nothing to compare */ }
// }
// store.save(&fresh).await?;
// ```

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Value kinds that can be held in a snapshot
///
/// Emptiness matters: a snapshot that exists but holds nothing is a
/// degenerate state, not a baseline.
pub trait Snapshot: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Whether the snapshot holds no records
    fn is_empty(&self) -> bool;
}

impl<T> Snapshot for Vec<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

/// Outcome of [`SnapshotStore::load_or_seed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded<T> {
    /// A valid, non-empty previous snapshot
    Existing(T),
    /// No snapshot existed; the fresh data was written as the first baseline
    Seeded,
    /// The snapshot was unreadable; it was replaced by the fresh data
    Recovered,
}

impl<T> Loaded<T> {
    /// The previous snapshot, if there is one to diff against
    pub fn previous(self) -> Option<T> {
        match self {
            Loaded::Existing(previous) => Some(previous),
            Loaded::Seeded | Loaded::Recovered => None,
        }
    }
}

/// Trait for snapshot store implementations
///
/// Each store is exclusively owned by one pipeline. Implementations must
/// still be `Send + Sync` so the pipeline can be driven from any runtime
/// worker.
///
/// # Error contract
///
/// - Unparsable content is never an error from [`load_or_seed`](Self::load_or_seed);
///   it is recovered by rewriting the baseline.
/// - A parsable but empty snapshot is [`Error::EmptySnapshot`](crate::Error::EmptySnapshot).
/// - I/O failures are [`Error::StateStore`](crate::Error::StateStore).
#[async_trait]
pub trait SnapshotStore<T: Snapshot>: Send + Sync {
    /// Read the snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: the stored snapshot
    /// - `Ok(None)`: nothing stored yet
    /// - `Err(Error)`: storage or parse error
    async fn load(&self) -> Result<Option<T>, crate::Error>;

    /// Read the snapshot, seeding or recovering it from `fresh` when needed
    ///
    /// # Parameters
    ///
    /// - `fresh`: the current cycle's complete data set
    async fn load_or_seed(&self, fresh: &T) -> Result<Loaded<T>, crate::Error>;

    /// Overwrite the snapshot with `data`
    async fn save(&self, data: &T) -> Result<(), crate::Error>;

    /// Human-readable location, for logs and error messages
    fn location(&self) -> String;
}
