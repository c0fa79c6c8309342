// # Scope Feed Trait
//
// Defines the interface for retrieving the upstream bug-bounty scope feed.
//
// ## Implementations
//
// - HTTP GET of a versioned JSON document: `scopewatch-feed-http` crate
//
// ## Usage
//
// ```rust,ignore
// use scopewatch_core::traits::ScopeFeed;
// use scopewatch_core::model::decode_programs;
//
// let payload = feed.fetch().await?;
// let programs = decode_programs(&payload)?;
// ```

use async_trait::async_trait;

/// Trait for scope feed implementations
///
/// The feed returns raw bytes; decoding is owned by the core so every
/// transport agrees on what a valid document is.
///
/// # Contract
///
/// - One network round trip per call, no retries (the scheduler owns retry)
/// - Non-2xx responses are errors, never an empty payload
#[async_trait]
pub trait ScopeFeed: Send + Sync {
    /// Fetch the current feed document
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<u8>)`: the raw document body
    /// - `Err(Error)`: transport failure or non-success status
    async fn fetch(&self) -> Result<Vec<u8>, crate::Error>;

    /// Feed name (for logging)
    fn feed_name(&self) -> &'static str;
}
