//! Date string parsing for settings files and the CLI.
//!
//! All dates are interpreted as UTC.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATE_TIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d%H%M%S",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Parses a date in one of the accepted layouts.
///
/// Accepts RFC 3339, `2023-03-01 08:00:00`, `2023-03-01T08:00:00`,
/// `20230301080000`, `2023-03-01` and `20230301`. Date-only inputs resolve to
/// midnight.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if no layout matches.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for layout in DATE_TIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, layout) {
            return Ok(dt.and_utc());
        }
    }

    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(input, layout) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt.and_utc());
            }
        }
    }

    Err(Error::InvalidInput(format!("unrecognised date '{input}'")))
}
