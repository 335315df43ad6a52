//! The check-once cycle: read, diff, persist, publish, roll back.
//!
//! [`Watcher::check_once`] is safe to re-run after any failure. The new
//! snapshot is persisted before anything is published, so no event ever
//! precedes the state that justifies it. If a publish then fails, the
//! previous serialized snapshot is written back (a compensating write,
//! not a transaction) and the next cycle diffs against the old baseline
//! again.
//!
//! Publish order within a cycle:
//!
//! 1. `current_year` -- only when the education year changed
//! 2. `secondary_db_loaded` -- on every detected change, and only if (1)
//!    succeeded

use metawatch_types::StateSnapshot;
use tracing::{debug, info, warn};

use crate::publisher::{EventWriter, NotificationPublisher, PublishError};
use crate::source::{SourceDatabase, SourceError, SourceReader};
use crate::store::{SlotBackend, StateStore, StoreError};
use crate::supervisor::{CycleOutcome, PollCycle};

/// Errors of a single check cycle, tagged with the phase that failed.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Reading the source snapshot failed; the store was not touched.
    #[error("failed to get source state: {0}")]
    Source(#[from] SourceError),

    /// Loading the previous snapshot failed.
    #[error("failed to load previous state from storage: {0}")]
    LoadState(#[source] StoreError),

    /// The stored previous snapshot is not valid JSON.
    #[error("failed to decode previous state from storage: {0}")]
    DecodeState(#[source] serde_json::Error),

    /// The current snapshot could not be serialized.
    #[error("failed to encode current state: {0}")]
    EncodeState(#[source] serde_json::Error),

    /// Persisting the current snapshot failed; nothing was published.
    #[error("failed to persist current state: {0}")]
    PersistState(#[source] StoreError),

    /// The year-change event failed; the store was rolled back.
    #[error("failed to send current year event: {0}")]
    PublishYear(#[source] PublishError),

    /// The reload event failed; the store was rolled back.
    #[error("failed to send secondary db loaded event: {0}")]
    PublishReload(#[source] PublishError),
}

/// Result of a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Source and stored snapshots are equal; nothing was written or sent.
    Unchanged,
    /// A change was persisted and published.
    Changed {
        /// Whether the year-change event was sent too.
        year_changed: bool,
    },
}

/// Composes the source, the state store, and the publisher into one
/// idempotent cycle.
#[derive(Debug)]
pub struct Watcher<D, B, W> {
    database: D,
    reader: SourceReader,
    store: StateStore<B>,
    publisher: NotificationPublisher<W>,
}

impl<D, B, W> Watcher<D, B, W>
where
    D: SourceDatabase,
    B: SlotBackend,
    W: EventWriter,
{
    /// Assemble a watcher. The store should be the only owner of its slot.
    pub const fn new(
        database: D,
        reader: SourceReader,
        store: StateStore<B>,
        publisher: NotificationPublisher<W>,
    ) -> Self {
        Self {
            database,
            reader,
            store,
            publisher,
        }
    }

    /// Load the persisted snapshot up front so a broken slot fails at
    /// startup rather than on the first cycle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the slot cannot be read.
    pub fn preload_state(&mut self) -> Result<(), StoreError> {
        self.store.get().map(|_| ())
    }

    /// The source database handle.
    pub const fn database(&self) -> &D {
        &self.database
    }

    /// The state store.
    pub const fn store(&self) -> &StateStore<B> {
        &self.store
    }

    /// Run one read-diff-persist-publish cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckError`] naming the failed phase. Publish failures
    /// are returned after a best-effort rollback of the store.
    pub async fn check_once(&mut self) -> Result<CheckOutcome, CheckError> {
        let current = self.reader.read_snapshot(&self.database).await?;

        let previous_serialized = self.store.get().map_err(CheckError::LoadState)?.to_vec();
        let previous = decode_snapshot(&previous_serialized)?;

        if previous.as_ref() == Some(&current) {
            debug!(
                observed_at = %current.observed_at,
                education_year = current.education_year,
                "source state unchanged"
            );
            return Ok(CheckOutcome::Unchanged);
        }

        let current_serialized = serde_json::to_vec(&current).map_err(CheckError::EncodeState)?;
        self.store
            .set(&current_serialized)
            .map_err(CheckError::PersistState)?;

        info!(
            observed_at = %current.observed_at,
            education_year = current.education_year,
            previous_observed_at = ?previous.map(|p| p.observed_at.to_rfc3339()),
            previous_education_year = ?previous.map(|p| p.education_year),
            "source state changed"
        );

        let year_changed = previous.map(|p| p.education_year) != Some(current.education_year);
        if year_changed
            && let Err(e) = self
                .publisher
                .publish_year_changed(current.education_year)
                .await
        {
            self.roll_back(&previous_serialized);
            return Err(CheckError::PublishYear(e));
        }

        if let Err(e) = self
            .publisher
            .publish_source_reloaded(
                current.observed_at,
                previous.map(|p| p.observed_at),
                current.education_year,
            )
            .await
        {
            self.roll_back(&previous_serialized);
            return Err(CheckError::PublishReload(e));
        }

        Ok(CheckOutcome::Changed { year_changed })
    }

    /// Restore the previous serialized snapshot. Failures are logged only,
    /// the publish error stays the one reported.
    fn roll_back(&mut self, previous_serialized: &[u8]) {
        if let Err(e) = self.store.set(previous_serialized) {
            warn!(error = %e, "failed to roll back state store");
        } else {
            debug!("state store rolled back to previous snapshot");
        }
    }
}

impl<D, B, W> PollCycle for Watcher<D, B, W>
where
    D: SourceDatabase,
    B: SlotBackend,
    W: EventWriter,
{
    type Error = CheckError;

    async fn run_cycle(&mut self) -> Result<CycleOutcome, CheckError> {
        self.check_once().await.map(|_| CycleOutcome::Continue)
    }
}

/// Decode the stored snapshot; an empty slot means "never observed".
fn decode_snapshot(serialized: &[u8]) -> Result<Option<StateSnapshot>, CheckError> {
    if serialized.trim_ascii().is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(serialized)
        .map(Some)
        .map_err(CheckError::DecodeState)
}
