//! Paced, best-effort notification delivery

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NotifyConfig;
use crate::model::ChangeEvent;
use crate::traits::Notifier;

/// Sends change events one by one through a [`Notifier`]
///
/// Delivery failures are logged and swallowed: a webhook outage never fails
/// a cycle, and the snapshot has already been saved by the time anything is
/// dispatched.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    message_delay: Duration,
    log_notifications: bool,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, config: &NotifyConfig) -> Self {
        Self {
            notifier,
            message_delay: config.message_delay(),
            log_notifications: config.log_notifications,
        }
    }

    /// Deliver every event in order, pausing between messages
    ///
    /// # Returns
    ///
    /// The number of events the notifier accepted.
    pub async fn deliver(&self, events: &[ChangeEvent]) -> usize {
        let mut delivered = 0;

        for (i, event) in events.iter().enumerate() {
            if i > 0 && !self.message_delay.is_zero() {
                tokio::time::sleep(self.message_delay).await;
            }

            match self.notifier.notify(event).await {
                Ok(()) => {
                    debug!("Delivered {} for {}", event.kind(), event.key());
                    delivered += 1;
                }
                Err(e) => warn!(
                    "{} failed to deliver {} for {}: {}",
                    self.notifier.notifier_name(),
                    event.kind(),
                    event.key(),
                    e
                ),
            }
        }

        delivered
    }

    /// Send an informational message when log notifications are enabled
    pub async fn log(&self, message: &str) {
        if !self.log_notifications {
            return;
        }

        if let Err(e) = self.notifier.log(message).await {
            warn!(
                "{} failed to deliver log message: {}",
                self.notifier.notifier_name(),
                e
            );
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("notifier", &self.notifier.notifier_name())
            .field("message_delay", &self.message_delay)
            .field("log_notifications", &self.log_notifications)
            .finish()
    }
}
