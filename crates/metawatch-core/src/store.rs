//! Durable single-slot persistence for the last accepted snapshot.
//!
//! [`StateStore`] wraps a [`SlotBackend`] with a load-once cache: the
//! first [`StateStore::get`] reads the slot, later calls are served from
//! memory, and [`StateStore::set`] writes through. The daemon never
//! re-reads the slot behind its own back, so a single instance must own
//! the slot for the lifetime of the process.
//!
//! An empty value is the "no prior state" sentinel. A slot that does not
//! exist yet reads as empty.

/// Errors raised by a slot backend. Surfaced verbatim, never retried here.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading the slot failed.
    #[error("failed to read state slot {location}: {source}")]
    Read {
        /// Where the slot lives (file path, key, ...).
        location: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing the slot failed.
    #[error("failed to write state slot {location}: {source}")]
    Write {
        /// Where the slot lives (file path, key, ...).
        location: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Backing medium of the state slot.
pub trait SlotBackend {
    /// Read the whole slot. `Ok(None)` means the slot does not exist yet.
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the whole slot with `value`.
    fn write(&mut self, value: &[u8]) -> Result<(), StoreError>;
}

/// Load-once, write-through cache over a [`SlotBackend`].
#[derive(Debug)]
pub struct StateStore<B> {
    backend: B,
    value: Vec<u8>,
    loaded: bool,
}

impl<B: SlotBackend> StateStore<B> {
    /// Create a store; nothing is read until the first [`get`](Self::get).
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            value: Vec::new(),
            loaded: false,
        }
    }

    /// Return the slot contents, loading them on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the first load fails. The store stays
    /// unloaded so the next call tries again.
    pub fn get(&mut self) -> Result<&[u8], StoreError> {
        if !self.loaded {
            self.value = self.backend.read()?.unwrap_or_default();
            self.loaded = true;
        }
        Ok(&self.value)
    }

    /// Write `value` through to the slot.
    ///
    /// A no-op when the cache is loaded and already holds the same bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the backend write fails; the cache
    /// is left unchanged in that case.
    pub fn set(&mut self, value: &[u8]) -> Result<(), StoreError> {
        if self.loaded && self.value == value {
            return Ok(());
        }
        self.backend.write(value)?;
        value.clone_into(&mut self.value);
        self.loaded = true;
        Ok(())
    }

    /// The underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }
}
