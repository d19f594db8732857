//! Bit-field types understood by `BITFIELD GET`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Signedness of a bit field.
///
/// Redis supports unsigned fields up to 63 bits and signed fields up to 64
/// bits, so the kind bounds how many buckets one window can span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// `u<W>` fields, at most 63 bits wide.
    #[default]
    Unsigned,
    /// `i<W>` fields, at most 64 bits wide.
    Signed,
}

impl FieldKind {
    /// Widest field Redis accepts for this kind.
    #[must_use]
    pub const fn max_width(self) -> u8 {
        match self {
            Self::Unsigned => 63,
            Self::Signed => 64,
        }
    }

    /// Type prefix used on the wire.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Unsigned => 'u',
            Self::Signed => 'i',
        }
    }

    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Signed => "signed",
        }
    }

    /// Parses a kind name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unsigned" | "u" => Some(Self::Unsigned),
            "signed" | "i" => Some(Self::Signed),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated `u<W>` / `i<W>` field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitFieldType {
    kind: FieldKind,
    width: u8,
}

impl BitFieldType {
    /// Creates a field type, rejecting widths the store cannot decode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if `width` is zero or wider than
    /// [`FieldKind::max_width`].
    pub fn new(kind: FieldKind, width: u64) -> Result<Self> {
        if width == 0 {
            return Err(Error::Encoding(format!(
                "bit-field width must be at least 1, got {width}"
            )));
        }
        if width > u64::from(kind.max_width()) {
            return Err(Error::Encoding(format!(
                "bit-field width {width} exceeds the {kind} maximum of {}",
                kind.max_width()
            )));
        }
        let width = u8::try_from(width)
            .map_err(|_| Error::Encoding(format!("bit-field width {width} does not fit a byte")))?;
        Ok(Self { kind, width })
    }

    /// Returns the field kind.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns the width in bits.
    #[must_use]
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Mask selecting the low `width` bits of a decoded value.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Reinterprets a decoded reply as the raw `width`-bit pattern.
    ///
    /// Signed replies come back sign-extended; masking drops the extension.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn raw_bits(&self, value: i64) -> u64 {
        (value as u64) & self.mask()
    }
}

impl fmt::Display for BitFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.width)
    }
}

impl FromStr for BitFieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        let kind = match chars.next() {
            Some('u' | 'U') => FieldKind::Unsigned,
            Some('i' | 'I') => FieldKind::Signed,
            _ => {
                return Err(Error::Encoding(format!(
                    "bit-field type '{s}' must start with 'u' or 'i'"
                )));
            },
        };
        let width: u64 = chars
            .as_str()
            .parse()
            .map_err(|_| Error::Encoding(format!("bit-field type '{s}' has no valid width")))?;
        Self::new(kind, width)
    }
}
