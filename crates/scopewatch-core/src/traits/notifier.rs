// # Notifier Trait
//
// Defines the interface for outbound notification delivery.
//
// ## Implementations
//
// - Discord webhook: `scopewatch-notify-discord` crate
//
// ## Delivery semantics
//
// Best-effort, fire-and-forget. The core calls a notifier sequentially, one
// message at a time, and only logs failures. Notifiers must not retry on
// their own and must not sleep; pacing between messages is owned by the
// core's dispatcher.

use async_trait::async_trait;

use crate::model::ChangeEvent;

/// Trait for notification delivery implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one change event
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the message was accepted by the remote end
    /// - `Err(Error)`: delivery failed (the caller logs and moves on)
    async fn notify(&self, event: &ChangeEvent) -> Result<(), crate::Error>;

    /// Deliver one informational log line
    async fn log(&self, message: &str) -> Result<(), crate::Error>;

    /// Notifier name (for logging)
    fn notifier_name(&self) -> &'static str;
}
