//! Configuration for the daemon.
//!
//! All configuration is loaded from environment variables, optionally
//! seeded from a `.env` file in the working directory. Empty values count
//! as unset.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use metawatch_core::{
    DEFAULT_CUTOVER_MONTH, EducationCalendar, SourceQueries, SupervisorConfig, YearSource,
};
use metawatch_db::PostgresConfig;

use crate::error::DaemonError;

/// Default NATS subject prefix for change events.
const DEFAULT_EVENT_SUBJECT: &str = "meta_events";

/// Default path of the state slot file.
const DEFAULT_STORAGE_FILE: &str = "storage.json";

/// Default time zone of naive source timestamps.
const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::Kyiv;

/// Complete daemon configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Source database URL and pool settings.
    pub source_database: PostgresConfig,
    /// NATS server URL (e.g. `nats://localhost:4222`).
    pub nats_url: String,
    /// Subject prefix; events go to `{event_subject}.{event_kind}`.
    pub event_subject: String,
    /// Path of the state slot file.
    pub storage_file: PathBuf,
    /// Loop pacing and error cap.
    pub supervisor: SupervisorConfig,
    /// Time zone and cutover month.
    pub calendar: EducationCalendar,
    /// Which fact the education year is derived from.
    pub year_source: YearSource,
    /// SQL for the two raw facts.
    pub queries: SourceQueries,
}

impl WatcherConfig {
    /// Load configuration from the process environment.
    ///
    /// Required variables:
    /// - `SOURCE_DATABASE_URL` -- source database connection string
    /// - `NATS_URL` -- NATS server connection string
    ///
    /// Optional variables:
    /// - `SOURCE_DB_MAX_CONNECTIONS` -- source pool size (default 2)
    /// - `SOURCE_DB_ACQUIRE_TIMEOUT` -- seconds to wait for a connection (default 5)
    /// - `SOURCE_DB_IDLE_TIMEOUT` -- seconds before idle connections close (default 300)
    /// - `EVENT_SUBJECT` -- subject prefix (default `meta_events`)
    /// - `STORAGE_FILE` -- state slot path (default `storage.json`)
    /// - `PAUSE_AFTER_SUCCESS` -- seconds between successful cycles (default 600)
    /// - `PAUSE_AFTER_ERROR` -- seconds after a failed cycle (default 60)
    /// - `ERROR_COUNT_TO_BREAK` -- consecutive failures before giving up (default 3)
    /// - `TIME_ZONE` -- IANA zone of source timestamps (default `Europe/Kyiv`)
    /// - `EDUCATION_YEAR_CUTOVER_MONTH` -- first month of a new year (default 8)
    /// - `EDUCATION_YEAR_SOURCE` -- `registration` or `activity` (default `registration`)
    /// - `LAST_ACTIVITY_QUERY` -- SQL returning the last activity timestamp as text
    /// - `FIRST_REGISTRATION_QUERY` -- SQL returning the first registration date as text
    pub fn from_env() -> Result<Self, DaemonError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DaemonError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let source_database_url = required(var("SOURCE_DATABASE_URL"), "SOURCE_DATABASE_URL")?;
        let pool_defaults = PostgresConfig::new(&source_database_url);
        let max_connections: u32 = parse_or(
            var("SOURCE_DB_MAX_CONNECTIONS"),
            "SOURCE_DB_MAX_CONNECTIONS",
            pool_defaults.max_connections,
        )?;
        if max_connections == 0 {
            return Err(DaemonError::Config(
                "invalid SOURCE_DB_MAX_CONNECTIONS: must be at least 1".to_owned(),
            ));
        }
        let acquire_timeout: u64 = parse_or(
            var("SOURCE_DB_ACQUIRE_TIMEOUT"),
            "SOURCE_DB_ACQUIRE_TIMEOUT",
            pool_defaults.acquire_timeout.as_secs(),
        )?;
        let idle_timeout: u64 = parse_or(
            var("SOURCE_DB_IDLE_TIMEOUT"),
            "SOURCE_DB_IDLE_TIMEOUT",
            pool_defaults.idle_timeout.as_secs(),
        )?;
        let source_database = PostgresConfig {
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout),
            idle_timeout: Duration::from_secs(idle_timeout),
            ..pool_defaults
        };
        let nats_url = required(var("NATS_URL"), "NATS_URL")?;

        let event_subject =
            var("EVENT_SUBJECT").unwrap_or_else(|| DEFAULT_EVENT_SUBJECT.to_owned());
        let storage_file = PathBuf::from(
            var("STORAGE_FILE").unwrap_or_else(|| DEFAULT_STORAGE_FILE.to_owned()),
        );

        let defaults = SupervisorConfig::default();
        let pause_after_success: u64 = parse_or(
            var("PAUSE_AFTER_SUCCESS"),
            "PAUSE_AFTER_SUCCESS",
            defaults.pause_after_success.as_secs(),
        )?;
        let pause_after_error: u64 = parse_or(
            var("PAUSE_AFTER_ERROR"),
            "PAUSE_AFTER_ERROR",
            defaults.pause_after_error.as_secs(),
        )?;
        let error_count_to_break: u32 = parse_or(
            var("ERROR_COUNT_TO_BREAK"),
            "ERROR_COUNT_TO_BREAK",
            defaults.error_count_to_break,
        )?;
        if error_count_to_break == 0 {
            return Err(DaemonError::Config(
                "invalid ERROR_COUNT_TO_BREAK: must be at least 1".to_owned(),
            ));
        }

        let zone = var("TIME_ZONE").map_or(Ok(DEFAULT_TIME_ZONE), |value| {
            value
                .trim()
                .parse::<Tz>()
                .map_err(|e| DaemonError::Config(format!("invalid TIME_ZONE: {e}")))
        })?;
        let cutover_month: u32 = parse_or(
            var("EDUCATION_YEAR_CUTOVER_MONTH"),
            "EDUCATION_YEAR_CUTOVER_MONTH",
            DEFAULT_CUTOVER_MONTH,
        )?;
        let calendar = EducationCalendar::new(zone, cutover_month).map_err(|e| {
            DaemonError::Config(format!("invalid EDUCATION_YEAR_CUTOVER_MONTH: {e}"))
        })?;

        let year_source = var("EDUCATION_YEAR_SOURCE")
            .map_or(Ok(YearSource::default()), |value| parse_year_source(&value))?;

        let default_queries = SourceQueries::default();
        let queries = SourceQueries {
            last_activity: var("LAST_ACTIVITY_QUERY").unwrap_or(default_queries.last_activity),
            first_registration: var("FIRST_REGISTRATION_QUERY")
                .unwrap_or(default_queries.first_registration),
        };

        Ok(Self {
            source_database,
            nats_url,
            event_subject,
            storage_file,
            supervisor: SupervisorConfig {
                pause_after_success: Duration::from_secs(pause_after_success),
                pause_after_error: Duration::from_secs(pause_after_error),
                error_count_to_break,
            },
            calendar,
            year_source,
            queries,
        })
    }
}

/// Load `.env` from the working directory if there is one.
///
/// Returns whether a file was loaded. Variables already set in the process
/// environment win over the file.
pub fn load_env_file() -> Result<bool, DaemonError> {
    dotenvy::dotenv().map(|_| true).or_else(|err| match err {
        dotenvy::Error::Io(_) => Ok(false),
        _ => Err(DaemonError::Config(format!("failed to load .env file: {err}"))),
    })
}

fn required(value: Option<String>, name: &str) -> Result<String, DaemonError> {
    value.ok_or_else(|| DaemonError::Config(format!("missing required env var {name}")))
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T, DaemonError>
where
    T: FromStr,
    T::Err: Display,
{
    value.map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| DaemonError::Config(format!("invalid {name}: {e}")))
    })
}

fn parse_year_source(value: &str) -> Result<YearSource, DaemonError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "registration" => Ok(YearSource::FirstRegistration),
        "activity" => Ok(YearSource::LastActivity),
        other => Err(DaemonError::Config(format!(
            "invalid EDUCATION_YEAR_SOURCE: {other} (expected registration or activity)"
        ))),
    }
}
