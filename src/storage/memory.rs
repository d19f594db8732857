//! In-memory bit store for testing.
//!
//! Mirrors Redis string-bitmap semantics closely enough that the engine
//! cannot tell the difference: MSB-first bit order, implicit zero padding on
//! growth, `BITCOUNT` index normalisation and sign-extended `BITFIELD GET`.

use crate::models::{BitFieldType, FieldKind};
use crate::storage::traits::BitStore;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Highest bit offset Redis accepts (512 MiB strings).
const MAX_BIT_OFFSET: u64 = (1 << 32) - 1;

/// In-memory bit store.
///
/// Uses `RwLock` for thread-safe access. Data is not persisted between runs.
///
/// # Example
///
/// ```rust
/// use signin::storage::{BitStore, InMemoryBitStore};
///
/// let store = InMemoryBitStore::new();
/// assert!(!store.set_bit("k", 7, true).unwrap());
/// assert!(store.get_bit("k", 7).unwrap());
/// assert_eq!(store.bytes("k"), Some(vec![0b0000_0001]));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBitStore {
    bitmaps: RwLock<HashMap<String, Vec<u8>>>,
    commands: AtomicU64,
}

impl InMemoryBitStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the raw bytes under `key`.
    #[must_use]
    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.bitmaps
            .read()
            .ok()
            .and_then(|maps| maps.get(key).cloned())
    }

    /// Number of keys holding a bitmap.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.bitmaps.read().map(|maps| maps.len()).unwrap_or(0)
    }

    /// Number of commands served so far.
    #[must_use]
    pub fn commands_issued(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    fn check_offset(operation: &str, offset: u64) -> Result<usize> {
        if offset > MAX_BIT_OFFSET {
            return Err(Error::RemoteStore {
                operation: operation.to_string(),
                cause: "bit offset is not an integer or out of range".to_string(),
            });
        }
        usize::try_from(offset).map_err(|e| Error::RemoteStore {
            operation: operation.to_string(),
            cause: e.to_string(),
        })
    }

    fn lock_error(operation: &str) -> Error {
        Error::RemoteStore {
            operation: operation.to_string(),
            cause: "bitmap lock poisoned".to_string(),
        }
    }
}

/// Reads bit `offset` (MSB-first) from `bytes`, zero past the end.
fn bit_at(bytes: &[u8], offset: usize) -> bool {
    bytes
        .get(offset / 8)
        .is_some_and(|&byte| (byte >> (7 - offset % 8)) & 1 == 1)
}

/// Resolves a `BITCOUNT` byte range the way Redis does.
fn byte_range(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { (len + end).max(0) } else { end };
    let end = end.min(len - 1);
    if start > end {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(end).ok()?))
}

impl BitStore for InMemoryBitStore {
    fn get_bit(&self, key: &str, offset: u64) -> Result<bool> {
        self.record_command();
        let offset = Self::check_offset("getbit", offset)?;
        let maps = self
            .bitmaps
            .read()
            .map_err(|_| Self::lock_error("getbit"))?;
        Ok(maps.get(key).is_some_and(|bytes| bit_at(bytes, offset)))
    }

    fn set_bit(&self, key: &str, offset: u64, value: bool) -> Result<bool> {
        self.record_command();
        let offset = Self::check_offset("setbit", offset)?;
        let mut maps = self
            .bitmaps
            .write()
            .map_err(|_| Self::lock_error("setbit"))?;

        let bytes = maps.entry(key.to_string()).or_default();
        let index = offset / 8;
        if bytes.len() <= index {
            bytes.resize(index + 1, 0);
        }
        let mask = 1u8 << (7 - offset % 8);
        let previous = bytes[index] & mask != 0;
        if value {
            bytes[index] |= mask;
        } else {
            bytes[index] &= !mask;
        }
        Ok(previous)
    }

    fn bit_count(&self, key: &str, start_byte: i64, end_byte: i64) -> Result<u64> {
        self.record_command();
        let maps = self
            .bitmaps
            .read()
            .map_err(|_| Self::lock_error("bitcount"))?;
        let Some(bytes) = maps.get(key) else {
            return Ok(0);
        };
        let Some((start, end)) = byte_range(start_byte, end_byte, bytes.len()) else {
            return Ok(0);
        };
        Ok(bytes[start..=end]
            .iter()
            .map(|byte| u64::from(byte.count_ones()))
            .sum())
    }

    fn bit_field_get(&self, key: &str, field: BitFieldType, offset: u64) -> Result<Option<i64>> {
        self.record_command();
        let first = Self::check_offset("bitfield", offset)?;
        let maps = self
            .bitmaps
            .read()
            .map_err(|_| Self::lock_error("bitfield"))?;
        let bytes = maps.get(key).map_or(&[][..], Vec::as_slice);

        let width = u32::from(field.width());
        let raw = (0..usize::from(field.width())).fold(0u64, |acc, i| {
            (acc << 1) | u64::from(bit_at(bytes, first + i))
        });

        #[allow(clippy::cast_possible_wrap)]
        let value = match field.kind() {
            FieldKind::Unsigned => raw as i64,
            FieldKind::Signed if width == 64 => raw as i64,
            FieldKind::Signed => {
                let shift = 64 - width;
                ((raw << shift) as i64) >> shift
            },
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_bit_returns_previous() {
        let store = InMemoryBitStore::new();
        assert!(!store.set_bit("k", 3, true).unwrap());
        assert!(store.set_bit("k", 3, true).unwrap());
        assert!(store.set_bit("k", 3, false).unwrap());
        assert!(!store.get_bit("k", 3).unwrap());
    }

    #[test]
    fn test_msb_first_layout() {
        let store = InMemoryBitStore::new();
        store.set_bit("k", 0, true).unwrap();
        store.set_bit("k", 9, true).unwrap();
        assert_eq!(store.bytes("k"), Some(vec![0b1000_0000, 0b0100_0000]));
    }

    #[test]
    fn test_missing_key_reads_zero() {
        let store = InMemoryBitStore::new();
        assert!(!store.get_bit("missing", 100).unwrap());
        assert_eq!(store.bit_count("missing", 0, -1).unwrap(), 0);
        let field = BitFieldType::new(FieldKind::Unsigned, 8).unwrap();
        assert_eq!(store.bit_field_get("missing", field, 0).unwrap(), Some(0));
        assert_eq!(store.key_count(), 0);
    }

    #[test]
    fn test_offset_limit() {
        let store = InMemoryBitStore::new();
        let result = store.set_bit("k", MAX_BIT_OFFSET + 1, true);
        assert!(matches!(result, Err(Error::RemoteStore { .. })));
    }

    #[test]
    fn test_bit_count_ranges() {
        let store = InMemoryBitStore::new();
        // byte 0: 3 bits, byte 1: 1 bit, byte 2: 2 bits
        for offset in [0, 1, 2, 8, 22, 23] {
            store.set_bit("k", offset, true).unwrap();
        }
        assert_eq!(store.bit_count("k", 0, -1).unwrap(), 6);
        assert_eq!(store.bit_count("k", 0, 0).unwrap(), 3);
        assert_eq!(store.bit_count("k", 1, 1).unwrap(), 1);
        assert_eq!(store.bit_count("k", -1, -1).unwrap(), 2);
        assert_eq!(store.bit_count("k", -100, 100).unwrap(), 6);
        assert_eq!(store.bit_count("k", 2, 1).unwrap(), 0);
        assert_eq!(store.bit_count("k", 5, 9).unwrap(), 0);
    }

    #[test]
    fn test_bit_field_unsigned() {
        let store = InMemoryBitStore::new();
        // 1 0 1 0 1 across offsets 0..5
        for offset in [0, 2, 4] {
            store.set_bit("k", offset, true).unwrap();
        }
        let u5 = BitFieldType::new(FieldKind::Unsigned, 5).unwrap();
        assert_eq!(store.bit_field_get("k", u5, 0).unwrap(), Some(0b10101));

        let u3 = BitFieldType::new(FieldKind::Unsigned, 3).unwrap();
        assert_eq!(store.bit_field_get("k", u3, 2).unwrap(), Some(0b101));

        // Window running past the end pads with zeros.
        let u12 = BitFieldType::new(FieldKind::Unsigned, 12).unwrap();
        assert_eq!(
            store.bit_field_get("k", u12, 0).unwrap(),
            Some(0b1010_1000_0000)
        );
    }

    #[test]
    fn test_bit_field_signed_extends() {
        let store = InMemoryBitStore::new();
        for offset in [0, 3, 4] {
            store.set_bit("k", offset, true).unwrap();
        }
        let i5 = BitFieldType::new(FieldKind::Signed, 5).unwrap();
        assert_eq!(store.bit_field_get("k", i5, 0).unwrap(), Some(-13));

        let i64_field = BitFieldType::new(FieldKind::Signed, 64).unwrap();
        for offset in 0..64 {
            store.set_bit("full", offset, true).unwrap();
        }
        assert_eq!(store.bit_field_get("full", i64_field, 0).unwrap(), Some(-1));
    }

    #[test]
    fn test_commands_issued() {
        let store = InMemoryBitStore::new();
        store.set_bit("k", 1, true).unwrap();
        store.get_bit("k", 1).unwrap();
        store.bit_count("k", 0, -1).unwrap();
        assert_eq!(store.commands_issued(), 3);
    }
}
