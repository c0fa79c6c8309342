// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// ## Purpose
//
// A snapshot that does not survive restarts. Useful for tests and for dry
// runs where every start should behave like a first run.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The first cycle after a restart always seeds a new baseline
// - Corruption cannot happen, so `Loaded::Recovered` is never returned

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::snapshot_store::{Loaded, Snapshot, SnapshotStore};

/// In-memory snapshot store
///
/// Clones share the same underlying slot, so a test can keep a handle and
/// inspect what the pipeline persisted.
#[derive(Debug, Clone)]
pub struct MemorySnapshotStore<T> {
    inner: Arc<RwLock<Option<T>>>,
}

impl<T: Snapshot> MemorySnapshotStore<T> {
    /// Create an empty store (behaves like a missing file)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a store that already holds `snapshot`
    pub fn with_snapshot(snapshot: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(snapshot))),
        }
    }

    /// Current content, if any
    pub async fn current(&self) -> Option<T> {
        self.inner.read().await.clone()
    }
}

impl<T: Snapshot> Default for MemorySnapshotStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Snapshot> SnapshotStore<T> for MemorySnapshotStore<T> {
    async fn load(&self) -> Result<Option<T>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn load_or_seed(&self, fresh: &T) -> Result<Loaded<T>, Error> {
        let mut guard = self.inner.write().await;
        match guard.as_ref() {
            None => {
                *guard = Some(fresh.clone());
                Ok(Loaded::Seeded)
            }
            Some(previous) if previous.is_empty() => {
                Err(Error::EmptySnapshot(self.location()))
            }
            Some(previous) => Ok(Loaded::Existing(previous.clone())),
        }
    }

    async fn save(&self, data: &T) -> Result<(), Error> {
        *self.inner.write().await = Some(data.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
