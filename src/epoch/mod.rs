//! Date to bit-offset mapping for one tracking epoch.
//!
//! Offset `i` is the i-th bucket of `interval` length after the epoch start.
//! When a window of `W` buckets is decoded as a big-endian integer, bucket
//! `i` of the window sits at bit `W - 1 - i` counted from the LSB, so the LSB
//! is always the most recent bucket.

mod clock;
mod keys;

pub use clock::{Clock, FixedClock, SystemClock};
pub use keys::KeyBuilder;

use crate::models::{BitFieldType, FieldKind};
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt::Write as _;

/// A contiguous run of buckets fetched with one `BITFIELD GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Offset of the oldest bucket in the window.
    pub offset: u64,
    /// Field type covering every bucket in the window.
    pub field: BitFieldType,
}

impl Window {
    /// Offset of the most recent bucket in the window.
    #[must_use]
    pub fn last_offset(&self) -> u64 {
        self.offset + u64::from(self.field.width()) - 1
    }
}

/// The date arithmetic of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    interval: TimeDelta,
    field_kind: FieldKind,
    future_guard: bool,
}

impl Epoch {
    /// Creates the mapper. `interval` must be at least one millisecond; the
    /// config builder enforces this.
    #[must_use]
    pub const fn new(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        interval: TimeDelta,
        field_kind: FieldKind,
        future_guard: bool,
    ) -> Self {
        Self {
            start,
            end,
            interval,
            field_kind,
            future_guard,
        }
    }

    /// Returns the epoch start date.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the bucket length.
    #[must_use]
    pub const fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Maps `date` to its bucket offset.
    ///
    /// Dates past the configured end date are clamped to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateRange`] if the future guard is on and `date` is
    /// later than `now + interval`, or if `date` precedes the epoch start.
    pub fn offset_of(&self, date: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
        if self.future_guard {
            let bound = now
                .checked_add_signed(self.interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if date > bound {
                return Err(Error::DateRange(format!(
                    "{date} is later than the future bound {bound}"
                )));
            }
        }

        let date = match self.end {
            Some(end) if date > end => end,
            _ => date,
        };

        self.buckets_between(self.start, date)
    }

    /// Start date of the bucket at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateRange`] if the date is not representable.
    pub fn date_at(&self, offset: u64) -> Result<DateTime<Utc>> {
        let out_of_range =
            || Error::DateRange(format!("bucket {offset} is beyond the representable range"));

        let steps = i64::try_from(offset).map_err(|_| out_of_range())?;
        let millis = self
            .interval_millis()
            .checked_mul(steps)
            .ok_or_else(out_of_range)?;
        let delta = TimeDelta::try_milliseconds(millis).ok_or_else(out_of_range)?;
        self.start
            .checked_add_signed(delta)
            .ok_or_else(out_of_range)
    }

    /// Number of buckets spanning `[start, end]` inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateRange`] if `end` precedes `start`.
    pub fn bucket_count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64> {
        Ok(self.buckets_between(start, end)? + 1)
    }

    /// Smallest field type covering every bucket in `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateRange`] if `end` precedes `start` and
    /// [`Error::Encoding`] if the span is wider than the field kind allows.
    pub fn width_for(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<BitFieldType> {
        let width = self.bucket_count(start, end)?;
        BitFieldType::new(self.field_kind, width)
    }

    /// Window covering the buckets of `from` through `to`.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::offset_of`] failures, returns [`Error::DateRange`]
    /// if `from` falls in a later bucket than `to`, and [`Error::Encoding`] if
    /// the window is too wide to decode in one call.
    pub fn window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Window> {
        let lower = self.offset_of(from, now)?;
        let upper = self.offset_of(to, now)?;
        if upper < lower {
            return Err(Error::DateRange(format!(
                "window start bucket {lower} is after its end bucket {upper}"
            )));
        }

        let field = self.width_for(self.date_at(lower)?, self.date_at(upper)?)?;
        tracing::debug!(offset = lower, field = %field, "Resolved bit window");
        Ok(Window {
            offset: lower,
            field,
        })
    }

    fn buckets_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64> {
        let delta = to.signed_duration_since(from);
        if delta < TimeDelta::zero() {
            return Err(Error::DateRange(format!("{to} precedes {from}")));
        }
        let buckets = delta.num_milliseconds() / self.interval_millis();
        u64::try_from(buckets).map_err(|_| Error::DateRange(format!("{to} precedes {from}")))
    }

    fn interval_millis(&self) -> i64 {
        self.interval.num_milliseconds().max(1)
    }
}

/// Formats `date` with a `strftime` pattern.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the pattern cannot be rendered.
pub fn format_date(date: DateTime<Utc>, format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| Error::Encoding(format!("cannot format date with '{format}'")))?;
    Ok(out)
}
