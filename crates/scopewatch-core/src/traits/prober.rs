// # Prober Trait
//
// Defines the interface for HTTP liveness probing of a batch of hostnames.
//
// ## Implementations
//
// - `httpx` child process: `scopewatch-recon` crate

use async_trait::async_trait;

use crate::model::ProbeResult;

/// Trait for HTTP probing implementations
///
/// # Contract
///
/// - Called exactly once per freshness cycle with the whole aggregated
///   hostname list
/// - A host that cannot be reached is reported as a result with
///   `succeeded = false`, not as an error
/// - `Err` means the batch itself could not run (missing binary, crash)
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe every host in `hostnames`
    async fn probe(&self, hostnames: &[String]) -> Result<Vec<ProbeResult>, crate::Error>;

    /// Prober name (for logging)
    fn prober_name(&self) -> &'static str;
}
