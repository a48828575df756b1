//! Error types for the ingestion pipeline.
//!
//! Nothing on the hot path is fatal: transient feed and store errors are
//! retried, stale cursors force a resync, malformed records are dropped and
//! counted. Only startup unreachability escapes to the process boundary.

/// Errors that can occur while ingesting, storing or distributing events.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transient feed failure (network blip, server closed the stream)
    #[error("feed error: {0}")]
    Feed(String),

    /// The resumption cursor expired at the server; a resync is required
    #[error("watch cursor expired at server")]
    StaleCursor,

    /// A raw change is missing a required field and was rejected
    #[error("malformed event: {0}")]
    Malformed(String),

    /// SQLite database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP transport error talking to the Kubernetes API
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization / deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration (bad CA bundle, unreadable token file, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// General internal error
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry with backoff can reasonably be expected to help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Feed(_) | Self::Http(_) | Self::Database(_))
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
