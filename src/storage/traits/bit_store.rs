//! Bit store trait.
//!
//! The engine needs exactly four primitives from its store, each atomic as a
//! single command:
//!
//! | Method | Redis command | Returns |
//! |--------|---------------|---------|
//! | `get_bit` | `GETBIT key offset` | the bit |
//! | `set_bit` | `SETBIT key offset value` | the bit before the write |
//! | `bit_count` | `BITCOUNT key start end` | set bits in a byte range |
//! | `bit_field_get` | `BITFIELD key GET type offset` | the decoded field |
//!
//! Bits are addressed MSB-first within each byte: offset 0 is the high bit of
//! byte 0. Reading past the end of a bitmap (or a missing key) yields zeros.
//!
//! # Error Modes
//!
//! Every failure reported by the store surfaces as
//! [`crate::Error::RemoteStore`]. Implementations never retry.

use crate::Result;
use crate::models::BitFieldType;
use std::sync::Arc;

/// Trait for bit-addressable stores.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn BitStore>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - `set_bit` must report the previous bit from the same command that
///   writes, never from a separate read
pub trait BitStore: Send + Sync {
    /// Reads the bit at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store command fails.
    fn get_bit(&self, key: &str, offset: u64) -> Result<bool>;

    /// Writes the bit at `offset` and returns its previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store command fails.
    fn set_bit(&self, key: &str, offset: u64, value: bool) -> Result<bool>;

    /// Counts set bits between two byte indexes, inclusive.
    ///
    /// Negative indexes count from the end: `0, -1` covers the whole bitmap.
    ///
    /// # Errors
    ///
    /// Returns an error if the store command fails.
    fn bit_count(&self, key: &str, start_byte: i64, end_byte: i64) -> Result<u64>;

    /// Reads a `field`-typed integer starting at bit `offset`.
    ///
    /// Returns `None` if the store replied with nil.
    ///
    /// # Errors
    ///
    /// Returns an error if the store command fails.
    fn bit_field_get(&self, key: &str, field: BitFieldType, offset: u64) -> Result<Option<i64>>;

    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not answer.
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Releases any held connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be released cleanly.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: BitStore + ?Sized> BitStore for Arc<T> {
    fn get_bit(&self, key: &str, offset: u64) -> Result<bool> {
        (**self).get_bit(key, offset)
    }

    fn set_bit(&self, key: &str, offset: u64, value: bool) -> Result<bool> {
        (**self).set_bit(key, offset, value)
    }

    fn bit_count(&self, key: &str, start_byte: i64, end_byte: i64) -> Result<u64> {
        (**self).bit_count(key, start_byte, end_byte)
    }

    fn bit_field_get(&self, key: &str, field: BitFieldType, offset: u64) -> Result<Option<i64>> {
        (**self).bit_field_get(key, field, offset)
    }

    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}
