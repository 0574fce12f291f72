//! Fundamental types for the stakepool ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! account identifiers, timestamps and the clock abstraction.

pub mod address;
pub mod time;

pub use address::AccountId;
pub use time::{Clock, SystemClock, Timestamp};
