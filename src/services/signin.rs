//! Sign-in service.
//!
//! Owns the frozen configuration and a [`BitStore`], and turns subject/date
//! requests into single bit commands. Every operation is one round trip.

use crate::config::SignInConfig;
use crate::epoch::{Clock, Epoch, KeyBuilder, SystemClock};
use crate::models::{BitFieldType, SignOutcome, SignStates};
use crate::services::decode;
use crate::storage::BitStore;
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;

/// Attendance tracking over one epoch.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use signin::{FixedClock, InMemoryBitStore, SignInConfig, SignInService};
/// use std::sync::Arc;
///
/// let start = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
/// let now = Utc.with_ymd_and_hms(2023, 3, 3, 12, 0, 0).unwrap();
/// let config = SignInConfig::builder().start_date(start).build().unwrap();
/// let service = SignInService::new(InMemoryBitStore::new(), config)
///     .unwrap()
///     .with_clock(Arc::new(FixedClock::new(now)));
///
/// assert!(service.sign("42", now).unwrap().is_first());
/// assert_eq!(service.consecutive_sign_count("42", start).unwrap(), 1);
/// ```
pub struct SignInService<S: BitStore> {
    store: S,
    config: SignInConfig,
    epoch: Epoch,
    keys: KeyBuilder,
    clock: Arc<dyn Clock>,
}

impl<S: BitStore> SignInService<S> {
    /// Creates a service on the wall clock.
    ///
    /// In debug mode the store is pinged first so a bad handle fails here
    /// rather than on the first sign.
    ///
    /// # Errors
    ///
    /// Returns the ping failure in debug mode, or [`crate::Error::Encoding`]
    /// if the epoch start cannot be rendered into a key suffix.
    pub fn new(store: S, config: SignInConfig) -> Result<Self> {
        if config.debug() {
            store.ping()?;
            tracing::debug!(
                prefix = config.key_prefix(),
                start = %config.start_date(),
                interval_secs = config.interval().num_seconds(),
                "Sign-in store reachable"
            );
        }
        Ok(Self {
            epoch: config.epoch(),
            keys: config.key_builder()?,
            store,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SignInConfig {
        &self.config
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the store key for `subject` in this epoch.
    #[must_use]
    pub fn key_for(&self, subject: &str) -> String {
        self.keys.key_for(subject)
    }

    /// Returns the bucket offset of `date`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DateRange`] if the date precedes the epoch or
    /// trips the future guard.
    pub fn offset_of(&self, date: DateTime<Utc>) -> Result<u64> {
        self.epoch.offset_of(date, self.clock.now())
    }

    /// Returns the field type covering `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DateRange`] for an inverted range and
    /// [`crate::Error::Encoding`] if the range is too wide.
    pub fn width_for(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<BitFieldType> {
        self.epoch.width_for(start, end)
    }

    /// Marks `subject` as signed in the bucket containing `date`.
    ///
    /// Signing is idempotent: a repeat sign reports
    /// [`SignOutcome::AlreadySigned`] and leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DateRange`] for dates outside the epoch and
    /// [`crate::Error::RemoteStore`] if the store command fails.
    #[instrument(skip(self), fields(operation = "sign"))]
    pub fn sign(&self, subject: &str, date: DateTime<Utc>) -> Result<SignOutcome> {
        let offset = self.offset_of(date)?;
        let key = self.key_for(subject);
        let previous = self.store.set_bit(&key, offset, true)?;
        let outcome = SignOutcome::from_previous(previous);

        metrics::counter!("signin_signs_total", "outcome" => outcome.as_str()).increment(1);
        tracing::debug!(key = %key, offset, outcome = %outcome, "Signed");
        Ok(outcome)
    }

    /// Counts set bits between two byte indexes of `subject`'s bitmap.
    ///
    /// `0, -1` covers the whole bitmap. The range is in bytes, so each index
    /// covers eight buckets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteStore`] if the store command fails.
    #[instrument(skip(self), fields(operation = "sign_count"))]
    pub fn sign_count(&self, subject: &str, start_byte: i64, end_byte: i64) -> Result<u64> {
        self.store
            .bit_count(&self.key_for(subject), start_byte, end_byte)
    }

    /// Length of the current run of signed buckets.
    ///
    /// The run is counted back from the bucket containing now and cannot
    /// reach past the bucket of `reference_date` (usually the epoch start).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DateRange`] if `reference_date` is outside the
    /// epoch or in a later bucket than now, [`crate::Error::Encoding`] if the
    /// span is too wide, and [`crate::Error::RemoteStore`] on store failure.
    #[instrument(skip(self), fields(operation = "consecutive_sign_count"))]
    pub fn consecutive_sign_count(
        &self,
        subject: &str,
        reference_date: DateTime<Utc>,
    ) -> Result<u64> {
        let now = self.clock.now();
        let window = self.epoch.window(reference_date, now, now)?;
        let value = self
            .store
            .bit_field_get(&self.key_for(subject), window.field, window.offset)?;
        Ok(decode::streak(value, window.field))
    }

    /// Per-bucket states from the epoch start through `end_date`.
    ///
    /// Keys are bucket start dates in the configured date format. A subject
    /// that never signed in the range gets an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DateRange`] if `end_date` is outside the
    /// epoch, [`crate::Error::Encoding`] if the range is too wide, and
    /// [`crate::Error::RemoteStore`] on store failure.
    #[instrument(skip(self), fields(operation = "get_sign_states"))]
    pub fn get_sign_states(&self, subject: &str, end_date: DateTime<Utc>) -> Result<SignStates> {
        let now = self.clock.now();
        let window = self.epoch.window(self.epoch.start(), end_date, now)?;
        let value = self
            .store
            .bit_field_get(&self.key_for(subject), window.field, window.offset)?;
        decode::states(
            value,
            window.field,
            window.offset,
            &self.epoch,
            self.config.date_format(),
        )
    }

    /// Checks that the store answers.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub fn ping(&self) -> Result<()> {
        self.store.ping()
    }

    /// Releases the store connection.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}
