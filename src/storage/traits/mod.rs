//! Storage backend traits.

mod bit_store;

pub use bit_store::BitStore;
