//! Error types for the daemon.
//!
//! Everything that can stop the process ends up in [`DaemonError`]. Cycle
//! failures never do on their own: the supervisor counts them and only
//! gives up with [`SupervisorError::TooManyErrors`].

use metawatch_core::{StoreError, SupervisorError};
use metawatch_db::DbError;

/// Errors that terminate the daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Failed to connect to the NATS server.
    #[error("NATS error: {0}")]
    Nats(String),

    /// The source database adapter could not be set up.
    #[error("source database error: {0}")]
    Db(#[from] DbError),

    /// The state slot could not be loaded at startup.
    #[error("failed to load state storage: {0}")]
    State(#[from] StoreError),

    /// The supervising loop gave up.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}
