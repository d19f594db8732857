//! Sign-in results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-bucket sign states keyed by the formatted bucket start date.
///
/// Values are `0` (not signed) or `1` (signed). With the default
/// `%Y%m%d%H%M%S` label format the map iterates oldest bucket first.
pub type SignStates = BTreeMap<String, u8>;

/// Result of a successful sign.
///
/// Either variant means the bucket is now signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutcome {
    /// The bit went from 0 to 1 with this call.
    NewlySigned,
    /// The bit was already 1; the store was left unchanged.
    AlreadySigned,
}

impl SignOutcome {
    /// Maps the previous bit returned by `SETBIT` to an outcome.
    #[must_use]
    pub const fn from_previous(previous: bool) -> Self {
        if previous {
            Self::AlreadySigned
        } else {
            Self::NewlySigned
        }
    }

    /// Whether the bucket is signed after the call. Always true.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        true
    }

    /// Whether this call performed the first sign of the bucket.
    #[must_use]
    pub const fn is_first(self) -> bool {
        matches!(self, Self::NewlySigned)
    }

    /// Returns the outcome as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewlySigned => "newly_signed",
            Self::AlreadySigned => "already_signed",
        }
    }
}

impl fmt::Display for SignOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
