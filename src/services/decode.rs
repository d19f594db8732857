//! Decoders for fetched bit windows.
//!
//! A window of `W` buckets arrives as one integer whose MSB is the oldest
//! bucket and whose LSB is the most recent. Both decoders peel from the LSB.

use crate::Result;
use crate::epoch::{Epoch, format_date};
use crate::models::{BitFieldType, SignStates};

/// Number of contiguous signed buckets ending at the most recent one.
///
/// A nil reply counts as an all-zero window.
#[must_use]
pub fn streak(value: Option<i64>, field: BitFieldType) -> u64 {
    let raw = value.map_or(0, |v| field.raw_bits(v));
    u64::from(raw.trailing_ones()).min(u64::from(field.width()))
}

/// Expands a window starting at `offset` into per-bucket states.
///
/// Buckets are labelled with their start date rendered in `date_format`.
/// An all-zero or nil window yields an empty map.
///
/// # Errors
///
/// Returns an error if a bucket date cannot be computed or formatted.
pub fn states(
    value: Option<i64>,
    field: BitFieldType,
    offset: u64,
    epoch: &Epoch,
    date_format: &str,
) -> Result<SignStates> {
    let raw = value.map_or(0, |v| field.raw_bits(v));
    let mut states = SignStates::new();
    if raw == 0 {
        return Ok(states);
    }

    let width = u64::from(field.width());
    for bit in 0..width {
        let bucket = width - 1 - bit;
        let date = epoch.date_at(offset + bucket)?;
        let signed = u8::from((raw >> bit) & 1 == 1);
        states.insert(format_date(date, date_format)?, signed);
    }
    Ok(states)
}
