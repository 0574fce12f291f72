//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies of the pool (the clock and the asset backends) are
//! abstracted behind traits. This crate provides in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (advance time, inject failures)
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests and the simulator.

pub mod clock;
pub mod token;

pub use clock::NullClock;
pub use token::NullToken;
