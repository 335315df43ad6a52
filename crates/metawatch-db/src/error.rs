//! Error types for the adapter layer.
//!
//! Only connection setup surfaces [`DbError`]. Once connected, the
//! adapters report through the core error types (`SourceError`,
//! `StoreError`) so the watcher can tag the failed phase.

/// Errors that can occur while setting up an adapter.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
