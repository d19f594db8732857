//! Business logic services.
//!
//! Services combine the epoch arithmetic with a bit store and expose the
//! sign-in operations.

pub mod decode;
mod signin;

pub use signin::SignInService;
