//! Education calendar: source timestamp normalization and year derivation.
//!
//! The source database stores activity timestamps as loosely formatted
//! strings (`2023-09-15T10:30:00.123Z`, `2023-09-15 10:30:00+03:00`, ...)
//! that are really wall-clock times in the institution's time zone. The
//! calendar strips the decorations, parses the remainder, and pins it to
//! the configured zone.
//!
//! Education years are named by their starting calendar year. A date
//! before the cutover month belongs to the year that started the previous
//! autumn. The cutover is inclusive: day 1 of the cutover month already
//! belongs to the new year.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use metawatch_types::EDUCATION_YEAR_FLOOR;

use crate::source::SourceError;

/// Default cutover month (August).
///
/// Registration for a new academic year can start in the last days of
/// August, so dates from August onward already count toward it.
pub const DEFAULT_CUTOVER_MONTH: u32 = 8;

/// Accepted layouts of a normalized source timestamp.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Layout of the date prefix of a registration value.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Length of a `YYYY-MM-DD` prefix.
const DATE_PREFIX_LEN: usize = 10;

/// Errors raised when building a calendar from configuration.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// The cutover month is not a calendar month.
    #[error("invalid cutover month {0} (expected 1-12)")]
    InvalidCutoverMonth(u32),
}

/// Time zone and academic cutover used to interpret source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EducationCalendar {
    zone: Tz,
    cutover_month: u32,
}

impl EducationCalendar {
    /// Create a calendar for `zone` with the given cutover month (1-12).
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidCutoverMonth`] for months outside 1-12.
    pub fn new(zone: Tz, cutover_month: u32) -> Result<Self, CalendarError> {
        if !(1..=12).contains(&cutover_month) {
            return Err(CalendarError::InvalidCutoverMonth(cutover_month));
        }
        Ok(Self {
            zone,
            cutover_month,
        })
    }

    /// The fixed time zone source timestamps are interpreted in.
    pub const fn zone(&self) -> Tz {
        self.zone
    }

    /// The month at which the education year rolls over.
    pub const fn cutover_month(&self) -> u32 {
        self.cutover_month
    }

    /// Normalize a raw source timestamp into an instant in the calendar zone.
    ///
    /// Strips a trailing `Z`, a trailing numeric offset (`+03:00`, `+03`),
    /// and any fractional seconds, then parses the wall-clock remainder.
    /// The stripped offset is not trusted: the source writes local times.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Parse`] if the remainder is not a timestamp
    /// or falls into a daylight-saving gap.
    pub fn normalize_timestamp(&self, raw: &str) -> Result<DateTime<FixedOffset>, SourceError> {
        let cleaned = clean_timestamp(raw);
        let naive = DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&cleaned, format).ok())
            .ok_or_else(|| SourceError::Parse {
                value: raw.to_owned(),
                reason: "expected YYYY-MM-DDTHH:MM:SS".to_owned(),
            })?;
        self.localize(&naive).ok_or_else(|| SourceError::Parse {
            value: raw.to_owned(),
            reason: format!("local time does not exist in {}", self.zone.name()),
        })
    }

    /// Derive the education year from a first-registration value.
    ///
    /// Only the leading `YYYY-MM-DD` is considered; any time part is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Parse`] for a malformed date and
    /// [`SourceError::YearBelowFloor`] when the year is before 2022.
    pub fn year_for_registration(&self, raw: &str) -> Result<i32, SourceError> {
        let trimmed = raw.trim();
        let prefix = trimmed
            .get(..DATE_PREFIX_LEN)
            .ok_or_else(|| SourceError::Parse {
                value: raw.to_owned(),
                reason: "expected a YYYY-MM-DD prefix".to_owned(),
            })?;
        let date =
            NaiveDate::parse_from_str(prefix, DATE_FORMAT).map_err(|e| SourceError::Parse {
                value: raw.to_owned(),
                reason: e.to_string(),
            })?;
        self.year_for_date(date)
    }

    /// Derive the education year from an already normalized timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::YearBelowFloor`] when the year is before 2022.
    pub fn year_for_timestamp(&self, timestamp: &DateTime<FixedOffset>) -> Result<i32, SourceError> {
        self.year_for_date(timestamp.date_naive())
    }

    /// Derive the education year a calendar date belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::YearBelowFloor`] when the year is before 2022.
    pub fn year_for_date(&self, date: NaiveDate) -> Result<i32, SourceError> {
        let year = if date.month() < self.cutover_month {
            date.year().saturating_sub(1)
        } else {
            date.year()
        };

        if year < EDUCATION_YEAR_FLOOR {
            return Err(SourceError::YearBelowFloor {
                year,
                floor: EDUCATION_YEAR_FLOOR,
            });
        }
        Ok(year)
    }

    /// Midnight on the first day of the cutover month of `year`.
    ///
    /// Returns `None` only if that instant does not exist in the zone.
    pub fn academic_start(&self, year: i32) -> Option<DateTime<FixedOffset>> {
        let start = NaiveDate::from_ymd_opt(year, self.cutover_month, 1)?.and_hms_opt(0, 0, 0)?;
        self.localize(&start)
    }

    fn localize(self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        self.zone
            .from_local_datetime(naive)
            .earliest()
            .map(|local| local.fixed_offset())
    }
}

/// Strip the UTC marker, numeric offset, and fractional seconds.
fn clean_timestamp(raw: &str) -> String {
    let value = raw.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);
    let value = strip_numeric_offset(value);
    strip_fraction(value)
}

fn strip_numeric_offset(value: &str) -> &str {
    // `+HH:MM` first, then the short `+HH` form.
    for width in [6, 3] {
        let Some(split) = value.len().checked_sub(width) else {
            continue;
        };
        if let (Some(head), Some(tail)) = (value.get(..split), value.get(split..))
            && is_offset_suffix(tail.as_bytes())
        {
            return head;
        }
    }
    value
}

fn is_offset_suffix(tail: &[u8]) -> bool {
    match tail {
        [sign, h1, h2, b':', m1, m2] => {
            matches!(sign, b'+' | b'-') && [h1, h2, m1, m2].iter().all(|b| b.is_ascii_digit())
        }
        [sign, h1, h2] => matches!(sign, b'+' | b'-') && h1.is_ascii_digit() && h2.is_ascii_digit(),
        _ => false,
    }
}

fn strip_fraction(value: &str) -> String {
    match value.split_once('.') {
        Some((head, rest)) => {
            let tail = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            format!("{head}{tail}")
        }
        None => value.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn kyiv(cutover: u32) -> EducationCalendar {
        EducationCalendar::new(chrono_tz::Europe::Kyiv, cutover).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_invalid_cutover_month() {
        assert!(EducationCalendar::new(chrono_tz::UTC, 0).is_err());
        assert!(EducationCalendar::new(chrono_tz::UTC, 13).is_err());
        assert!(EducationCalendar::new(chrono_tz::UTC, 12).is_ok());
    }

    #[test]
    fn parses_plain_timestamp_in_zone() {
        let ts = kyiv(8).normalize_timestamp("2022-11-02T04:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2022-11-02T04:00:00+02:00");
    }

    #[test]
    fn summer_time_uses_summer_offset() {
        let ts = kyiv(8).normalize_timestamp("2023-09-15T10:30:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-09-15T10:30:00+03:00");
    }

    #[test]
    fn strips_milliseconds_and_utc_marker() {
        let ts = kyiv(8).normalize_timestamp("2022-11-02T04:00:00.123Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2022-11-02T04:00:00+02:00");
    }

    #[test]
    fn strips_numeric_offset_without_converting() {
        let calendar = kyiv(8);
        let long = calendar.normalize_timestamp("2023-09-15T10:30:00+03:00").unwrap();
        let short = calendar.normalize_timestamp("2023-09-15 10:30:00.5+03").unwrap();
        let other = calendar.normalize_timestamp("2023-09-15T10:30:00-05:00").unwrap();
        assert_eq!(long.to_rfc3339(), "2023-09-15T10:30:00+03:00");
        assert_eq!(short, long);
        assert_eq!(other, long);
    }

    #[test]
    fn invalid_timestamp_is_parse_error() {
        let err = kyiv(8).normalize_timestamp("invalid").unwrap_err();
        assert!(matches!(err, SourceError::Parse { ref value, .. } if value == "invalid"));
    }

    #[test]
    fn nonexistent_local_time_is_parse_error() {
        // Clocks in Kyiv jumped from 03:00 to 04:00 on 2023-03-26.
        let err = kyiv(8).normalize_timestamp("2023-03-26T03:30:00").unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn august_cutover_boundary_is_inclusive() {
        let calendar = kyiv(8);
        assert_eq!(calendar.year_for_date(date(2024, 7, 31)).unwrap(), 2023);
        assert_eq!(calendar.year_for_date(date(2024, 8, 1)).unwrap(), 2024);
    }

    #[test]
    fn september_cutover_boundary_is_inclusive() {
        let calendar = kyiv(9);
        assert_eq!(calendar.year_for_date(date(2024, 8, 31)).unwrap(), 2023);
        assert_eq!(calendar.year_for_date(date(2024, 9, 1)).unwrap(), 2024);
    }

    #[test]
    fn december_belongs_to_the_same_year() {
        assert_eq!(kyiv(9).year_for_date(date(2023, 12, 31)).unwrap(), 2023);
        assert_eq!(kyiv(9).year_for_date(date(2024, 1, 1)).unwrap(), 2023);
    }

    #[test]
    fn year_below_floor_is_rejected_not_clamped() {
        let err = kyiv(8).year_for_date(date(2022, 3, 1)).unwrap_err();
        assert!(matches!(
            err,
            SourceError::YearBelowFloor {
                year: 2021,
                floor: 2022
            }
        ));
        assert_eq!(kyiv(8).year_for_date(date(2022, 8, 1)).unwrap(), 2022);
    }

    #[test]
    fn registration_uses_date_prefix_only() {
        let calendar = kyiv(8);
        assert_eq!(calendar.year_for_registration("2024-09-02").unwrap(), 2024);
        assert_eq!(
            calendar.year_for_registration("2024-09-02 08:15:00.000").unwrap(),
            2024
        );
        assert_eq!(calendar.year_for_registration("2025-02-10T00:00:00").unwrap(), 2024);
    }

    #[test]
    fn short_or_malformed_registration_is_parse_error() {
        let calendar = kyiv(8);
        assert!(matches!(
            calendar.year_for_registration("2024-9-2"),
            Err(SourceError::Parse { .. })
        ));
        assert!(matches!(
            calendar.year_for_registration("not a date at all"),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn year_from_timestamp_uses_local_date() {
        let calendar = kyiv(9);
        let ts = calendar.normalize_timestamp("2023-09-01T00:30:00").unwrap();
        assert_eq!(calendar.year_for_timestamp(&ts).unwrap(), 2023);
        let ts = calendar.normalize_timestamp("2023-08-31T23:59:59").unwrap();
        assert_eq!(calendar.year_for_timestamp(&ts).unwrap(), 2022);
    }

    #[test]
    fn academic_start_is_first_of_cutover_month() {
        let start = kyiv(8).academic_start(2023).unwrap();
        assert_eq!(start.to_rfc3339(), "2023-08-01T00:00:00+03:00");
    }
}
