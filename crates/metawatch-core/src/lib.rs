//! Change detection and resilient notification for the metawatch daemon.
//!
//! The daemon polls a legacy source database for two derived facts, the
//! latest activity timestamp and the education year, and publishes
//! events when they change. This crate owns everything between the raw
//! database strings and the bus messages:
//!
//! ```text
//! run_supervisor --> Watcher::check_once
//!                      |-- SourceReader          (read + normalize)
//!                      |-- StateStore            (previous snapshot, write-through)
//!                      +-- NotificationPublisher (year event, reload event)
//! ```
//!
//! # Modules
//!
//! - [`calendar`] -- Timestamp normalization and education year derivation
//! - [`source`] -- [`SourceDatabase`] trait and [`SourceReader`]
//! - [`store`] -- [`SlotBackend`] trait and the [`StateStore`] cache
//! - [`publisher`] -- [`EventWriter`] trait and [`NotificationPublisher`]
//! - [`watcher`] -- The check-once cycle with rollback on publish failure
//! - [`supervisor`] -- Retry pacing, error cap, and cancellable pauses
//!
//! [`SourceDatabase`]: source::SourceDatabase
//! [`SourceReader`]: source::SourceReader
//! [`SlotBackend`]: store::SlotBackend
//! [`StateStore`]: store::StateStore
//! [`EventWriter`]: publisher::EventWriter
//! [`NotificationPublisher`]: publisher::NotificationPublisher

pub mod calendar;
pub mod publisher;
pub mod source;
pub mod store;
pub mod supervisor;
pub mod watcher;

pub use calendar::{CalendarError, DEFAULT_CUTOVER_MONTH, EducationCalendar};
pub use publisher::{EventWriter, NotificationPublisher, PublishError};
pub use source::{SourceDatabase, SourceError, SourceQueries, SourceReader, YearSource};
pub use store::{SlotBackend, StateStore, StoreError};
pub use supervisor::{
    CycleOutcome, LoopExit, PollCycle, SupervisorConfig, SupervisorError, run_supervisor,
};
pub use watcher::{CheckError, CheckOutcome, Watcher};
