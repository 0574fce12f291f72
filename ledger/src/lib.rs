//! Ledger store for the staking pool.
//!
//! Holds every participant's staked balance, the pool's total staked supply
//! and the reward bookkeeping needed to settle accrual without re-scanning
//! history. The store checks its own invariants on every mutation; it never
//! talks to an asset backend.

pub mod account;
pub mod error;
pub mod pool;
pub mod snapshot;
pub mod store;

pub use account::ParticipantAccount;
pub use error::LedgerError;
pub use pool::PoolState;
pub use snapshot::{LedgerImage, Savepoint};
pub use store::{BalanceDelta, LedgerStore};
