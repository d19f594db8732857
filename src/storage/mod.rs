//! Storage layer abstraction.
//!
//! The engine talks to a [`BitStore`]: a key to bitmap map offering the four
//! Redis bit commands. Two backends ship:
//! - **Redis**: standalone or cluster, see [`RedisBitStore`]
//! - **Memory**: process-local, for tests and `--memory` runs

// Dropping the connection guard slightly early buys nothing.
#![allow(clippy::significant_drop_tightening)]

pub mod memory;
pub mod metrics;
pub mod redis;
pub mod traits;

pub use memory::InMemoryBitStore;
pub use metrics::record_operation_metrics;
pub use redis::RedisBitStore;
pub use traits::BitStore;
