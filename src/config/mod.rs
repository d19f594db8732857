//! Configuration management.
//!
//! [`SignInConfig`] is the frozen configuration the engine runs on. It is
//! validated once in [`SignInConfigBuilder::build`] so no operation can hit a
//! half-configured epoch. [`Settings`] is the packaging layer that fills the
//! builder from a TOML file and environment variables.

mod dates;
pub mod defaults;
mod settings;

pub use dates::parse_date;
pub use settings::{LoggingSettings, Settings, SettingsFile, StoreSettings};

use crate::epoch::{Epoch, KeyBuilder, format_date};
use crate::models::FieldKind;
use crate::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashSet;

/// Frozen engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInConfig {
    key_prefix: String,
    interval: TimeDelta,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    field_kind: FieldKind,
    date_format: String,
    future_guard: bool,
    debug: bool,
}

impl SignInConfig {
    /// Starts a builder with every optional field at its default.
    #[must_use]
    pub fn builder() -> SignInConfigBuilder {
        SignInConfigBuilder::default()
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Returns the bucket length.
    #[must_use]
    pub const fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Returns the epoch start date.
    #[must_use]
    pub const fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// Returns the optional epoch end date.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Returns the bit-field kind used for window decoding.
    #[must_use]
    pub const fn field_kind(&self) -> FieldKind {
        self.field_kind
    }

    /// Returns the `strftime` pattern for key suffixes and state labels.
    #[must_use]
    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Whether dates past `now + interval` are rejected.
    #[must_use]
    pub const fn future_guard(&self) -> bool {
        self.future_guard
    }

    /// Whether debug mode is on.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Builds the date-offset mapper for this epoch.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        Epoch::new(
            self.start_date,
            self.end_date,
            self.interval,
            self.field_kind,
            self.future_guard,
        )
    }

    /// Builds the key builder for this epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the start date cannot be rendered.
    pub fn key_builder(&self) -> Result<KeyBuilder> {
        KeyBuilder::new(&self.key_prefix, self.start_date, &self.date_format)
    }
}

/// Builder for [`SignInConfig`].
#[derive(Debug, Clone, Default)]
pub struct SignInConfigBuilder {
    key_prefix: Option<String>,
    interval: Option<TimeDelta>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    field_kind: Option<FieldKind>,
    date_format: Option<String>,
    future_guard: Option<bool>,
    debug: bool,
}

impl SignInConfigBuilder {
    /// Sets the key prefix.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the bucket length.
    #[must_use]
    pub const fn interval(mut self, interval: TimeDelta) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets the epoch start date. Required.
    #[must_use]
    pub const fn start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    /// Sets the epoch end date. Later dates are clamped to it.
    #[must_use]
    pub const fn end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    /// Overrides the bit-field kind.
    #[must_use]
    pub const fn field_kind(mut self, kind: FieldKind) -> Self {
        self.field_kind = Some(kind);
        self
    }

    /// Sets the `strftime` pattern for key suffixes and state labels.
    #[must_use]
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// Enables or disables the `now + interval` guard.
    #[must_use]
    pub const fn future_guard(mut self, enabled: bool) -> Self {
        self.future_guard = Some(enabled);
        self
    }

    /// Enables debug mode.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the start date is missing, the
    /// prefix is empty, the interval is shorter than one millisecond, the end
    /// date precedes the start date, or the date format is not a valid
    /// `strftime` pattern.
    pub fn build(self) -> Result<SignInConfig> {
        let start_date = self
            .start_date
            .ok_or_else(|| Error::InvalidConfig("epoch start date is required".to_string()))?;

        let key_prefix = self
            .key_prefix
            .unwrap_or_else(|| defaults::DEFAULT_KEY_PREFIX.to_string());
        if key_prefix.is_empty() {
            return Err(Error::InvalidConfig("key prefix must not be empty".to_string()));
        }

        let interval = self.interval.unwrap_or_else(defaults::default_interval);
        if interval.num_milliseconds() < 1 {
            return Err(Error::InvalidConfig(format!(
                "interval must be at least 1ms, got {interval}"
            )));
        }
        if TimeDelta::try_milliseconds(interval.num_milliseconds()) != Some(interval) {
            return Err(Error::InvalidConfig(format!(
                "interval must be a whole number of milliseconds, got {interval}"
            )));
        }

        if let Some(end) = self.end_date {
            if end < start_date {
                return Err(Error::InvalidConfig(format!(
                    "end date {end} precedes start date {start_date}"
                )));
            }
        }

        let date_format = self
            .date_format
            .unwrap_or_else(|| defaults::DEFAULT_DATE_FORMAT.to_string());
        validate_date_format(&date_format)?;

        let field_kind = self.field_kind.unwrap_or(defaults::DEFAULT_FIELD_KIND);
        validate_labels(
            start_date,
            self.end_date,
            interval,
            field_kind,
            &date_format,
        )?;

        Ok(SignInConfig {
            key_prefix,
            interval,
            start_date,
            end_date: self.end_date,
            field_kind,
            date_format,
            future_guard: self.future_guard.unwrap_or(true),
            debug: self.debug,
        })
    }
}

/// Rejects empty or malformed `strftime` patterns.
fn validate_date_format(format: &str) -> Result<()> {
    if format.is_empty() {
        return Err(Error::InvalidConfig("date format must not be empty".to_string()));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidConfig(format!(
            "date format '{format}' is not a valid strftime pattern"
        )));
    }
    Ok(())
}

/// Rejects formats that render two queryable buckets to the same label.
///
/// State maps always start at bucket 0 and span at most
/// [`FieldKind::max_width`] buckets, so only those labels need to differ.
fn validate_labels(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    interval: TimeDelta,
    kind: FieldKind,
    format: &str,
) -> Result<()> {
    let mut seen = HashSet::new();
    let mut date = Some(start);
    for _ in 0..kind.max_width() {
        let Some(bucket) = date.filter(|d| end.is_none_or(|end| *d <= end)) else {
            break;
        };
        let label = format_date(bucket, format)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if !seen.insert(label) {
            return Err(Error::InvalidConfig(format!(
                "date format '{format}' gives the same label to different {interval} buckets"
            )));
        }
        date = bucket.checked_add_signed(interval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = SignInConfig::builder().start_date(start()).build().unwrap();
        assert_eq!(config.key_prefix(), "signin");
        assert_eq!(config.interval(), TimeDelta::days(1));
        assert_eq!(config.field_kind(), FieldKind::Unsigned);
        assert_eq!(config.date_format(), "%Y%m%d%H%M%S");
        assert!(config.future_guard());
        assert!(!config.debug());
        assert!(config.end_date().is_none());
    }

    #[test]
    fn test_start_date_required() {
        let err = SignInConfig::builder().build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_bad_interval() {
        let result = SignInConfig::builder()
            .start_date(start())
            .interval(TimeDelta::zero())
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result = SignInConfig::builder()
            .start_date(start())
            .interval(TimeDelta::seconds(-5))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_end_before_start() {
        let result = SignInConfig::builder()
            .start_date(start())
            .end_date(start() - TimeDelta::days(1))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_empty_prefix_and_bad_format() {
        let result = SignInConfig::builder()
            .start_date(start())
            .key_prefix("")
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let result = SignInConfig::builder()
            .start_date(start())
            .date_format("%Y-%Q")
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_sub_millisecond_interval() {
        let result = SignInConfig::builder()
            .start_date(start())
            .interval(TimeDelta::microseconds(1500))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let config = SignInConfig::builder()
            .start_date(start())
            .interval(TimeDelta::milliseconds(1500))
            .build()
            .unwrap();
        let epoch = config.epoch();
        let now = start() + TimeDelta::seconds(10);
        let at = |ms| epoch.offset_of(start() + TimeDelta::milliseconds(ms), now).unwrap();
        assert_eq!(at(4499), 2);
        assert_eq!(at(4500), 3);
        assert_eq!(epoch.date_at(3).unwrap(), start() + TimeDelta::milliseconds(4500));
    }

    #[test]
    fn test_rejects_format_coarser_than_interval() {
        let result = SignInConfig::builder()
            .start_date(start())
            .interval(TimeDelta::milliseconds(500))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        // Days of the month repeat after 31 buckets.
        let result = SignInConfig::builder()
            .start_date(start())
            .date_format("%d")
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let config = SignInConfig::builder()
            .start_date(start())
            .interval(TimeDelta::milliseconds(500))
            .date_format("%Y%m%d%H%M%S%.3f")
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_label_check_stops_at_end_date() {
        // Hourly buckets with a daily label are fine while the epoch is one bucket long.
        let config = SignInConfig::builder()
            .start_date(start())
            .end_date(start() + TimeDelta::minutes(30))
            .interval(TimeDelta::hours(1))
            .date_format("%Y-%m-%d")
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = SignInConfig::builder()
            .start_date(start())
            .key_prefix("attendance")
            .interval(TimeDelta::hours(1))
            .field_kind(FieldKind::Signed)
            .date_format("%Y-%m-%d %H")
            .future_guard(false)
            .debug(true)
            .build()
            .unwrap();
        assert_eq!(config.key_prefix(), "attendance");
        assert_eq!(config.interval(), TimeDelta::hours(1));
        assert_eq!(config.field_kind(), FieldKind::Signed);
        assert!(!config.future_guard());
        assert!(config.debug());
    }
}
