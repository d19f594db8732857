//! Data models for signin.

mod field;
mod sign;

pub use field::{BitFieldType, FieldKind};
pub use sign::{SignOutcome, SignStates};
