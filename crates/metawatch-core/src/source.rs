//! Source database access: the only place that talks to the legacy DB.
//!
//! The [`SourceDatabase`] trait abstracts the driver. It only needs a
//! ping and single-row scalar queries returning the raw text
//! of a column. [`SourceReader`] runs the queries and turns the raw
//! strings into a [`StateSnapshot`] using an [`EducationCalendar`].

use std::future::Future;

use metawatch_types::StateSnapshot;
use tracing::debug;

use crate::calendar::EducationCalendar;

/// Errors raised while reading the source snapshot.
///
/// All of them are fatal to the current cycle only.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The ping failed before any query was sent.
    #[error("source database is unreachable: {0}")]
    Unreachable(String),

    /// A query was sent but failed.
    #[error("query failed ({query}): {message}")]
    Query {
        /// The SQL that failed.
        query: String,
        /// Driver error description.
        message: String,
    },

    /// The query returned no row, NULL, or a blank value.
    #[error("empty {field} from source database")]
    EmptySourceData {
        /// Which fact was missing.
        field: &'static str,
    },

    /// A raw value could not be parsed.
    #[error("cannot parse {value:?}: {reason}")]
    Parse {
        /// The raw value as read from the database.
        value: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The derived education year is earlier than the floor.
    #[error("wrong education year {year} (should be {floor} or later)")]
    YearBelowFloor {
        /// The derived year.
        year: i32,
        /// The lowest accepted year.
        floor: i32,
    },
}

/// Minimal driver surface needed to read a snapshot.
pub trait SourceDatabase {
    /// Check that the database is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Run a single-row, single-column query and return the value as text.
    ///
    /// Returns `Ok(None)` when the query yields no row or a NULL value.
    fn fetch_text(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<String>, SourceError>> + Send;
}

/// SQL used to read the two raw facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQueries {
    /// Returns the most recent activity timestamp.
    pub last_activity: String,
    /// Returns the earliest registration date.
    pub first_registration: String,
}

impl Default for SourceQueries {
    fn default() -> Self {
        Self {
            last_activity: "SELECT con_data::text FROM tsess_log ORDER BY id DESC LIMIT 1"
                .to_owned(),
            first_registration: "SELECT regdate::text FROM t_prjurn ORDER BY regdate ASC LIMIT 1"
                .to_owned(),
        }
    }
}

/// Which fact the education year is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearSource {
    /// The earliest registration date (separate query).
    #[default]
    FirstRegistration,
    /// The month of the last activity timestamp itself.
    LastActivity,
}

/// Reads the raw facts and normalizes them into a [`StateSnapshot`].
///
/// Holds no state between calls.
#[derive(Debug, Clone)]
pub struct SourceReader {
    calendar: EducationCalendar,
    queries: SourceQueries,
    year_source: YearSource,
}

impl SourceReader {
    /// Create a reader.
    pub const fn new(
        calendar: EducationCalendar,
        queries: SourceQueries,
        year_source: YearSource,
    ) -> Self {
        Self {
            calendar,
            queries,
            year_source,
        }
    }

    /// Ping the database, read both facts, and build a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unreachable`] if the database is unreachable, and
    /// any query, emptiness, parse, or year-floor error after that.
    pub async fn read_snapshot<D: SourceDatabase>(
        &self,
        db: &D,
    ) -> Result<StateSnapshot, SourceError> {
        db.ping().await?;

        let raw_activity =
            fetch_required(db, &self.queries.last_activity, "last activity timestamp").await?;
        let observed_at = self.calendar.normalize_timestamp(&raw_activity)?;

        let education_year = match self.year_source {
            YearSource::FirstRegistration => {
                let raw_registration = fetch_required(
                    db,
                    &self.queries.first_registration,
                    "first registration date",
                )
                .await?;
                self.calendar.year_for_registration(&raw_registration)?
            }
            YearSource::LastActivity => self.calendar.year_for_timestamp(&observed_at)?,
        };

        debug!(
            raw_activity = raw_activity,
            observed_at = %observed_at,
            education_year = education_year,
            "source snapshot read"
        );

        Ok(StateSnapshot::new(observed_at, education_year))
    }
}

async fn fetch_required<D: SourceDatabase>(
    db: &D,
    query: &str,
    field: &'static str,
) -> Result<String, SourceError> {
    match db.fetch_text(query).await? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SourceError::EmptySourceData { field }),
    }
}
