// # Enumerator Trait
//
// Defines the interface for subdomain enumeration: given a root domain,
// return candidate hostnames.
//
// ## Implementations
//
// - `subfinder` child process: `scopewatch-recon` crate

use async_trait::async_trait;

/// Trait for subdomain enumeration implementations
///
/// # Contract
///
/// - May return empty strings or surrounding whitespace; the freshness
///   pipeline normalizes and filters them
/// - An error is logged by the pipeline and treated as an empty result for
///   that domain; it never aborts the cycle
/// - Must be cancellation-safe: the pipeline wraps every call in a timeout
#[async_trait]
pub trait Enumerator: Send + Sync {
    /// Enumerate hostnames under `domain`
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>, crate::Error>;

    /// Enumerator name (for logging)
    fn enumerator_name(&self) -> &'static str;
}
