// # File Snapshot Store
//
// File-based implementation of SnapshotStore with corruption recovery.
//
// ## Purpose
//
// Keeps each pipeline's snapshot across daemon restarts and crashes.
//
// ## Crash Recovery
//
// - Atomic writes: new content goes to a sibling `.tmp` file which is then
//   renamed over the snapshot, so a crash mid-write leaves the old file
// - Corruption detection: content is parsed on every load
// - Recovery: unparsable content is discarded and replaced with the
//   caller's fresh data set; the caller is told so it can skip diffing
//
// ## File Format
//
// The snapshot value itself, verbatim, as JSON:
//
// ```json
// ["api.example.com", "www.example.com"]
// ```

use async_trait::async_trait;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::snapshot_store::{Loaded, Snapshot, SnapshotStore};

/// File-based snapshot store with corruption recovery
///
/// # Example
///
/// ```rust,no_run
/// use scopewatch_core::state::FileSnapshotStore;
/// use scopewatch_core::traits::{Loaded, SnapshotStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSnapshotStore::<Vec<String>>::new("data/Scopes.json");
///     let fresh = vec!["api.example.com".to_string()];
///
///     if let Loaded::Existing(previous) = store.load_or_seed(&fresh).await? {
///         println!("{} known assets", previous.len());
///     }
///
///     store.save(&fresh).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSnapshotStore<T> {
    path: PathBuf,
    /// Serializes writers; only matters when cycles are allowed to overlap
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Snapshot> FileSnapshotStore<T> {
    /// Create a store backed by `path`
    ///
    /// Nothing touches the disk until the first load or save; parent
    /// directories are created on the first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw file content, `None` if the file does not exist
    async fn read_raw(&self) -> Result<Option<String>, Error> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Snapshot file does not exist: {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(Error::state_store(format!(
                "Failed to read snapshot {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Write the snapshot atomically
    async fn write_snapshot(&self, data: &T) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create snapshot directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_vec(data)
            .map_err(|e| Error::state_store(format!("Failed to serialize snapshot: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(&json).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Snapshot written: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

#[async_trait]
impl<T: Snapshot> SnapshotStore<T> for FileSnapshotStore<T> {
    async fn load(&self) -> Result<Option<T>, Error> {
        let Some(content) = self.read_raw().await? else {
            return Ok(None);
        };

        let snapshot = serde_json::from_str(&content).map_err(|e| {
            Error::state_store(format!(
                "Failed to parse snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(snapshot))
    }

    async fn load_or_seed(&self, fresh: &T) -> Result<Loaded<T>, Error> {
        let Some(content) = self.read_raw().await? else {
            tracing::info!(
                "No snapshot at {}, seeding baseline from current cycle",
                self.path.display()
            );
            self.write_snapshot(fresh).await?;
            return Ok(Loaded::Seeded);
        };

        match serde_json::from_str::<T>(&content) {
            Ok(previous) if previous.is_empty() => {
                tracing::error!("Snapshot {} holds no records", self.path.display());
                Err(Error::EmptySnapshot(self.path.display().to_string()))
            }
            Ok(previous) => Ok(Loaded::Existing(previous)),
            Err(e) => {
                tracing::warn!(
                    "Snapshot {} appears corrupted: {}. Replacing it with the current data set.",
                    self.path.display(),
                    e
                );
                self.write_snapshot(fresh).await?;
                tracing::info!("Snapshot {} recovered", self.path.display());
                Ok(Loaded::Recovered)
            }
        }
    }

    async fn save(&self, data: &T) -> Result<(), Error> {
        self.write_snapshot(data).await
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
