//! Error types for scopewatch
//!
//! This module defines all error types used throughout the crate, and the
//! fatal/recoverable classification the scheduler applies to them.

use thiserror::Error;

/// Result type alias for scopewatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for scopewatch
#[derive(Error, Debug)]
pub enum Error {
    /// Scope feed could not be fetched (transport failure, non-2xx, timeout)
    #[error("Scope feed error: {0}")]
    Feed(String),

    /// Scope feed was fetched but is not the expected JSON document
    #[error("Scope feed decode error: {0}")]
    FeedDecode(String),

    /// Scope feed decoded to zero programs
    #[error("Scope feed contained no programs")]
    EmptyFeed,

    /// Subdomain enumeration errors
    #[error("Enumeration error: {0}")]
    Enumerate(String),

    /// HTTP probing errors
    #[error("Probe error: {0}")]
    Probe(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notify(String),

    /// Snapshot persistence errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// A snapshot exists and parses but holds nothing to compare against
    #[error("Snapshot {0} is empty; refusing to fabricate a baseline")]
    EmptySnapshot(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An enrichment task panicked or was cancelled before the barrier
    #[error("Enrichment task failed: {0}")]
    Task(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from collaborator adapters)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a scope feed error
    pub fn feed(msg: impl Into<String>) -> Self {
        Self::Feed(msg.into())
    }

    /// Create a scope feed decode error
    pub fn feed_decode(msg: impl Into<String>) -> Self {
        Self::FeedDecode(msg.into())
    }

    /// Create an enumeration error
    pub fn enumerate(msg: impl Into<String>) -> Self {
        Self::Enumerate(msg.into())
    }

    /// Create a probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error should stop the process under the default
    /// [`FailurePolicy::Exit`](crate::config::FailurePolicy::Exit).
    ///
    /// Fatal: the feed cannot be read, a snapshot cannot be read or written,
    /// or a snapshot is degenerate. Everything an external recon tool or the
    /// webhook can cause is not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Feed(_)
            | Error::FeedDecode(_)
            | Error::EmptyFeed
            | Error::StateStore(_)
            | Error::EmptySnapshot(_)
            | Error::Config(_)
            | Error::Task(_)
            | Error::Io(_)
            | Error::Json(_) => true,
            Error::Enumerate(_)
            | Error::Probe(_)
            | Error::Notify(_)
            | Error::Http(_)
            | Error::Other(_) => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
