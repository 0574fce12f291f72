//! Per-participant stake record.

use serde::{Deserialize, Serialize};
use stakepool_types::Timestamp;

/// Stake and reward bookkeeping for one participant.
///
/// An absent participant reads as `ParticipantAccount::default()`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAccount {
    /// Staking-asset units currently held in custody for this participant.
    pub staked_balance: u128,
    /// Reward accrued up to `last_checkpoint` and not yet claimed.
    pub pending_reward: u128,
    /// When accrual was last settled into `pending_reward`.
    pub last_checkpoint: Timestamp,
}

impl ParticipantAccount {
    /// An empty account carries no information and need not be stored.
    pub fn is_empty(&self) -> bool {
        self.staked_balance == 0 && self.pending_reward == 0
    }
}
