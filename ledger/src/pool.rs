//! Pool-level totals.

use serde::{Deserialize, Serialize};
use stakepool_types::Timestamp;

/// Aggregate state of the pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Sum of every participant's `staked_balance`.
    pub total_staked_supply: u128,
    /// Reward-asset units in custody and not yet paid out.
    pub reward_pool_remaining: u128,
    /// Cumulative reward-asset units ever credited to the pool.
    pub total_reward_funded: u128,
    /// Cumulative reward-asset units ever paid to participants.
    pub total_reward_paid: u128,
    /// Time of the most recent accrual checkpoint on any account.
    pub last_global_update: Timestamp,
}
