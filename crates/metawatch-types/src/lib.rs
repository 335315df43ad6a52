//! Shared type definitions for the metawatch daemon.
//!
//! Everything that crosses a process boundary lives here: the state
//! snapshot persisted between restarts and the event payloads published
//! to the message bus. Downstream consumers depend on the exact JSON
//! shapes, so field names are pinned with `serde` attributes.
//!
//! # Modules
//!
//! - [`snapshot`] -- The comparable `(observed_at, education_year)` tuple
//! - [`events`] -- Event kinds and their wire payloads

pub mod events;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use events::{CurrentYearEvent, EventKind, SecondaryDbLoadedEvent};
pub use snapshot::{EDUCATION_YEAR_FLOOR, StateSnapshot};
