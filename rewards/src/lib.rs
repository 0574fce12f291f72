//! Rewards engine for the staking pool.
//!
//! Participants stake one asset and accrue a second one over time:
//! `reward(p) = pending(p) + staked(p) × Σ(rate_i × overlap_i) / rate_scale`
//! where the sum runs over the global rate history from the participant's
//! last checkpoint to now.
//!
//! This crate handles:
//! - `stake`, `unstake`, `get_reward` as all-or-nothing operations
//! - Reward-pool funding and reconciliation against custody
//! - Rate changes that preserve accrual earned before the change
//! - Halting the pool once a ledger invariant is found broken

pub mod engine;
pub mod error;
pub mod events;
pub mod image;
pub mod rate;

pub use engine::{PoolAssets, RewardsEngine, DEFAULT_RATE_SCALE};
pub use error::RewardsError;
pub use events::{EventBus, PoolEvent};
pub use image::PoolImage;
pub use rate::{RateHistory, RateSegment};
