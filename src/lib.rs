//! # signin
//!
//! Attendance ("check-in") tracking on top of Redis bitmaps.
//!
//! Every tracked subject owns one bitmap per epoch. Bit `i` of that bitmap says
//! whether the subject signed in during the i-th bucket (a day, an hour, a
//! second...) after the epoch start date.
//!
//! ## Features
//!
//! - Idempotent sign-in with a single `SETBIT` round trip
//! - Total sign count over byte ranges (`BITCOUNT`)
//! - Current streak and per-bucket state maps decoded from one `BITFIELD GET`
//! - Pluggable stores: Redis (standalone or cluster) and an in-memory store
//!
//! ## Example
//!
//! ```rust,ignore
//! use signin::{SignInConfig, SignInService};
//! use signin::storage::RedisBitStore;
//!
//! let config = SignInConfig::builder()
//!     .start_date(start)
//!     .interval(chrono::TimeDelta::days(1))
//!     .build()?;
//! let service = SignInService::new(RedisBitStore::open("redis://localhost:6379")?, config)?;
//! service.sign("user-1", chrono::Utc::now())?;
//! let streak = service.consecutive_sign_count("user-1", start)?;
//! ```
//!
//! ## Epoch width
//!
//! Streak and state queries decode the whole epoch as one integer, so a single
//! epoch can only be queried while it spans at most 63 buckets (64 with a
//! signed field type). Integrators must start a new epoch (a new start date,
//! which yields a new key) before that limit is reached.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod epoch;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{SignInConfig, SignInConfigBuilder};
pub use epoch::{Clock, Epoch, FixedClock, KeyBuilder, SystemClock};
pub use models::{BitFieldType, FieldKind, SignOutcome, SignStates};
pub use services::SignInService;
pub use storage::{BitStore, InMemoryBitStore, RedisBitStore};

/// Error type for signin operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidStoreHandle` | No usable store connection could be built |
/// | `InvalidConfig` | Configuration rejected at construction |
/// | `InvalidInput` | Unparseable date strings from settings or the CLI |
/// | `DateRange` | Date before the epoch start or past the future guard |
/// | `Encoding` | Bit-field width is zero or wider than the store supports |
/// | `RemoteStore` | The store reported a failure |
/// | `FeatureNotEnabled` | Store backend compiled out |
#[derive(Debug, ThisError)]
pub enum Error {
    /// No usable remote-store connection is configured.
    ///
    /// Raised when:
    /// - The Redis URL cannot be parsed
    /// - Neither a URL nor cluster nodes are configured
    #[error("invalid store handle: {0}")]
    InvalidStoreHandle(String),

    /// The configuration was rejected before any operation ran.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input was provided.
    ///
    /// Raised when a date string matches none of the accepted layouts.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested date cannot be mapped to a bucket.
    ///
    /// Raised when:
    /// - The date precedes the epoch start
    /// - The date lies past `now + interval` while the future guard is on
    /// - A streak reference date falls after the current bucket
    #[error("date out of range: {0}")]
    DateRange(String),

    /// A bit-field type cannot be encoded.
    ///
    /// Raised when the computed width is zero or exceeds 63 bits (unsigned)
    /// or 64 bits (signed), or a field type string is malformed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A store command failed.
    #[error("store operation '{operation}' failed: {cause}")]
    RemoteStore {
        /// The command that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

/// Result type alias for signin operations.
pub type Result<T> = std::result::Result<T, Error>;
