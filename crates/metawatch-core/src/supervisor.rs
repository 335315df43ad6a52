//! Supervising loop around the poll cycle.
//!
//! [`run_supervisor`] runs a [`PollCycle`] repeatedly with two pauses: a
//! long one after success and a shorter one after an error. Consecutive
//! errors are counted and the loop gives up with
//! [`SupervisorError::TooManyErrors`] once the configured threshold is
//! reached. A success resets the counter.
//!
//! Pauses race against a [`CancellationToken`]. Cancellation is only
//! observed between cycles, never in the middle of one.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Default pause after a successful cycle (10 minutes).
const DEFAULT_PAUSE_AFTER_SUCCESS: Duration = Duration::from_mins(10);

/// Default pause after a failed cycle (1 minute).
const DEFAULT_PAUSE_AFTER_ERROR: Duration = Duration::from_mins(1);

/// Default number of consecutive errors that stops the loop.
const DEFAULT_ERROR_COUNT_TO_BREAK: u32 = 3;

/// Pacing and failure cap of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Pause after a successful cycle.
    pub pause_after_success: Duration,
    /// Pause after a failed cycle.
    pub pause_after_error: Duration,
    /// Consecutive failed cycles that terminate the loop.
    pub error_count_to_break: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            pause_after_success: DEFAULT_PAUSE_AFTER_SUCCESS,
            pause_after_error: DEFAULT_PAUSE_AFTER_ERROR,
            error_count_to_break: DEFAULT_ERROR_COUNT_TO_BREAK,
        }
    }
}

/// What a successful cycle asks the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Pause, then run another cycle.
    Continue,
    /// Stop the loop cleanly.
    Break,
}

/// How the loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A cycle returned [`CycleOutcome::Break`].
    Broken,
    /// The cancellation token fired during a pause.
    Cancelled,
}

/// Loop-level failure.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The consecutive error threshold was reached.
    #[error("too many errors: {count} consecutive failed iterations, last: {last_error}")]
    TooManyErrors {
        /// Consecutive failures counted.
        count: u32,
        /// Display form of the last cycle error.
        last_error: String,
    },
}

/// One unit of supervised work.
pub trait PollCycle {
    /// Cycle error; logged and counted by the loop.
    type Error: Display;

    /// Run a single cycle to completion.
    fn run_cycle(&mut self) -> impl Future<Output = Result<CycleOutcome, Self::Error>>;
}

/// Run `cycle` until it breaks, errors too often, or `shutdown` fires.
///
/// # Errors
///
/// Returns [`SupervisorError::TooManyErrors`] after exactly
/// `error_count_to_break` consecutive failed cycles.
pub async fn run_supervisor<C: PollCycle>(
    config: &SupervisorConfig,
    cycle: &mut C,
    shutdown: &CancellationToken,
) -> Result<LoopExit, SupervisorError> {
    let mut error_count: u32 = 0;

    info!(
        pause_after_success_secs = config.pause_after_success.as_secs(),
        pause_after_error_secs = config.pause_after_error.as_secs(),
        error_count_to_break = config.error_count_to_break,
        "supervisor loop starting"
    );

    loop {
        let pause = match cycle.run_cycle().await {
            Ok(CycleOutcome::Break) => {
                info!("loop break requested");
                return Ok(LoopExit::Broken);
            }
            Ok(CycleOutcome::Continue) => {
                error_count = 0;
                info!("iteration done success");
                config.pause_after_success
            }
            Err(e) => {
                error_count = error_count.saturating_add(1);
                error!(
                    error = %e,
                    consecutive_errors = error_count,
                    "iteration failed"
                );
                if error_count >= config.error_count_to_break {
                    error!(error = %e, "too many consecutive errors, giving up");
                    return Err(SupervisorError::TooManyErrors {
                        count: error_count,
                        last_error: e.to_string(),
                    });
                }
                config.pause_after_error
            }
        };

        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                info!("cancelled");
                return Ok(LoopExit::Cancelled);
            }
            () = tokio::time::sleep(pause) => {}
        }
    }
}
