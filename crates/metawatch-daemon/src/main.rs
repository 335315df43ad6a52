//! Metawatch daemon entry point.
//!
//! Polls a legacy source database for its latest activity timestamp and
//! education year, keeps the last accepted snapshot in a local file, and
//! publishes change events to NATS.
//!
//! # Architecture
//!
//! ```text
//! PostgreSQL --> SourceReader --> Watcher --> NotificationPublisher --> NATS
//!                                    |
//!                                    +--> StateStore --> storage.json
//! ```
//!
//! # Exit codes
//!
//! - `0` -- stopped by a signal
//! - `1` -- startup or other fatal error
//! - `2` -- a cycle asked the loop to break
//! - `3` -- too many consecutive failed cycles

mod config;
mod error;
mod nats;

use std::process::ExitCode;

use metawatch_core::{
    LoopExit, NotificationPublisher, SourceReader, StateStore, SupervisorError, Watcher,
    run_supervisor,
};
use metawatch_db::{FileSlot, PostgresSource};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{WatcherConfig, load_env_file};
use crate::error::DaemonError;
use crate::nats::NatsEventWriter;

/// Startup or other fatal error.
const EXIT_FATAL: u8 = 1;

/// A cycle returned a loop break.
const EXIT_LOOP_BROKEN: u8 = 2;

/// The consecutive error threshold was reached.
const EXIT_TOO_MANY_ERRORS: u8 = 3;

/// Application entry point.
///
/// Loads `.env`, initializes logging, then runs the watcher until it is
/// cancelled or gives up. The outcome is mapped to the process exit code.
#[tokio::main]
async fn main() -> ExitCode {
    // Before logging, so RUST_LOG from .env is honored.
    let env_file = load_env_file();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("metawatch-daemon starting");

    let result = match env_file {
        Ok(loaded) => {
            info!(env_file_loaded = loaded, "environment ready");
            run().await
        }
        Err(e) => Err(e),
    };

    match &result {
        Ok(exit) => info!(exit = ?exit, "metawatch-daemon stopped"),
        Err(e) => error!(error = %e, "metawatch-daemon failed"),
    }

    ExitCode::from(exit_status(&result))
}

/// Wire the adapters into a watcher and supervise it.
async fn run() -> Result<LoopExit, DaemonError> {
    let config = WatcherConfig::from_env()?;
    info!(
        source_max_connections = config.source_database.max_connections,
        event_subject = config.event_subject,
        storage_file = %config.storage_file.display(),
        pause_after_success_secs = config.supervisor.pause_after_success.as_secs(),
        pause_after_error_secs = config.supervisor.pause_after_error.as_secs(),
        error_count_to_break = config.supervisor.error_count_to_break,
        time_zone = %config.calendar.zone(),
        cutover_month = config.calendar.cutover_month(),
        year_source = ?config.year_source,
        "configuration loaded"
    );

    let source = PostgresSource::connect_lazy(&config.source_database)?;
    let writer = NatsEventWriter::connect(&config.nats_url, &config.event_subject).await?;

    let reader = SourceReader::new(config.calendar, config.queries, config.year_source);
    let store = StateStore::new(FileSlot::new(config.storage_file));
    let publisher = NotificationPublisher::new(writer, config.calendar);
    let mut watcher = Watcher::new(source.clone(), reader, store, publisher);

    watcher.preload_state()?;
    info!("state storage loaded");

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let outcome = run_supervisor(&config.supervisor, &mut watcher, &shutdown).await;
    source.close().await;
    outcome.map_err(DaemonError::from)
}

/// Map the daemon outcome to a process exit status.
fn exit_status(result: &Result<LoopExit, DaemonError>) -> u8 {
    match result {
        Ok(LoopExit::Cancelled) => 0,
        Ok(LoopExit::Broken) => EXIT_LOOP_BROKEN,
        Err(DaemonError::Supervisor(SupervisorError::TooManyErrors { .. })) => {
            EXIT_TOO_MANY_ERRORS
        }
        Err(_) => EXIT_FATAL,
    }
}

/// Cancel `shutdown` on the first termination signal.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut terminate), Ok(mut quit)) =
        (signal(SignalKind::terminate()), signal(SignalKind::quit()))
    else {
        warn!("failed to install SIGTERM/SIGQUIT handlers, listening for Ctrl-C only");
        wait_for_ctrl_c().await;
        return;
    };

    tokio::select! {
        () = wait_for_ctrl_c() => {}
        _ = terminate.recv() => info!(signal = "SIGTERM", "shutdown signal received"),
        _ = quit.recv() => info!(signal = "SIGQUIT", "shutdown signal received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(signal = "SIGINT", "shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
