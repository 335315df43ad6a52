//! Event kinds and wire payloads published on the message bus.
//!
//! Each message carries one payload serialized as JSON and is keyed by
//! the [`EventKind`] label. Consumers rely on the year-change event
//! arriving before the reload event of the same cycle.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The kinds of events this daemon emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The education year derived from the source changed.
    CurrentYear,
    /// The secondary source database was reloaded (any detected change).
    SecondaryDbLoaded,
}

impl EventKind {
    /// Fixed label used as the message key.
    pub const fn label(self) -> &'static str {
        match self {
            Self::CurrentYear => "current_year",
            Self::SecondaryDbLoaded => "secondary_db_loaded",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Payload of [`EventKind::CurrentYear`]: `{"year": 2023}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentYearEvent {
    /// The new education year.
    pub year: i32,
}

/// Payload of [`EventKind::SecondaryDbLoaded`].
///
/// Serialized as
/// `{"currentTimestamp": "...", "previousTimestamp": "...", "year": 2023}`
/// with RFC 3339 timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryDbLoadedEvent {
    /// Activity instant of the snapshot that was just accepted.
    pub current_timestamp: DateTime<FixedOffset>,
    /// Activity instant of the snapshot it replaced.
    pub previous_timestamp: DateTime<FixedOffset>,
    /// Education year of the accepted snapshot.
    pub year: i32,
}
