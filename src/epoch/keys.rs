//! Storage keys.

use chrono::{DateTime, Utc};

use super::format_date;
use crate::Result;

/// Derives `<prefix>:<subject>:<start date>` keys for one epoch.
///
/// The start date suffix is rendered once; a different start date gives a
/// different key and therefore a fresh bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: String,
    epoch_suffix: String,
}

impl KeyBuilder {
    /// Renders the epoch suffix with `date_format`.
    pub(crate) fn new(prefix: &str, start: DateTime<Utc>, date_format: &str) -> Result<Self> {
        Ok(Self {
            prefix: prefix.to_string(),
            epoch_suffix: format_date(start, date_format)?,
        })
    }

    /// Returns the key holding `subject`'s bitmap for this epoch.
    #[must_use]
    pub fn key_for(&self, subject: &str) -> String {
        format!("{}:{subject}:{}", self.prefix, self.epoch_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_layout() {
        let start = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        let keys = KeyBuilder::new("signin", start, "%Y%m%d%H%M%S").unwrap();
        assert_eq!(keys.key_for("1"), "signin:1:20230301000000");
        assert_eq!(keys.key_for("1"), keys.key_for("1"));
    }

    #[test]
    fn test_new_epoch_new_key() {
        let march = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();
        let a = KeyBuilder::new("signin", march, "%Y%m%d").unwrap();
        let b = KeyBuilder::new("signin", april, "%Y%m%d").unwrap();
        assert_ne!(a.key_for("u"), b.key_for("u"));
        assert_eq!(b.key_for("u"), "signin:u:20230401");
    }

    #[test]
    fn test_suffix_uses_configured_format() {
        let start = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        let keys = KeyBuilder::new("signin", start, "%Y-%m").unwrap();
        assert_eq!(keys.key_for("u"), "signin:u:2023-03");
    }
}
