//! Process-wide defaults.

use crate::models::FieldKind;
use chrono::TimeDelta;

/// Key prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "signin";

/// Default bucket length in seconds (one day).
pub const DEFAULT_INTERVAL_SECS: i64 = 86_400;

/// Default `strftime` pattern for the key suffix and state labels.
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Default field kind for window decoding.
pub const DEFAULT_FIELD_KIND: FieldKind = FieldKind::Unsigned;

/// Redis endpoint used when none is configured.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default store command timeout in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

/// Default bucket length.
#[must_use]
pub fn default_interval() -> TimeDelta {
    TimeDelta::seconds(DEFAULT_INTERVAL_SECS)
}
