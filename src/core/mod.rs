//! Core domain abstractions and types.
//!
//! Independent of any specific infrastructure concern — the rest of the
//! crate builds on these without reaching for global mutable state.

pub mod error;
pub mod types;

pub use error::{TrackerError, TrackerResult};
pub use types::{Mint, Signature, Timestamp};
