//! The state snapshot compared on every poll cycle.
//!
//! A snapshot is the pair of facts derived from the source database: the
//! most recent activity instant and the education year it implies. Two
//! snapshots are equal when both fields are equal, where timestamp
//! equality means the same instant (a `+02:00` and a `+03:00` rendering
//! of one moment compare equal).

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Lowest education year the source system can legitimately report.
///
/// Anything earlier is a data error, never a value to clamp.
pub const EDUCATION_YEAR_FLOOR: i32 = 2022;

/// The unit of comparison and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Most recent activity instant recorded by the source system,
    /// expressed in the configured source time zone, whole seconds.
    pub observed_at: DateTime<FixedOffset>,
    /// Education (academic) year, identified by its starting calendar year.
    pub education_year: i32,
}

impl StateSnapshot {
    /// Create a snapshot from its two facts.
    pub const fn new(observed_at: DateTime<FixedOffset>, education_year: i32) -> Self {
        Self {
            observed_at,
            education_year,
        }
    }
}
