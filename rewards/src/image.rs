//! Serializable image of a whole pool.

use serde::{Deserialize, Serialize};
use stakepool_ledger::LedgerImage;

use crate::error::RewardsError;
use crate::rate::RateHistory;

/// Everything needed to resume a pool: ledger state, rate history, scale and
/// halt status. Asset backends and the clock are supplied on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolImage {
    pub ledger: LedgerImage,
    pub rate_history: RateHistory,
    pub rate_scale: u128,
    pub poisoned: Option<String>,
}

impl PoolImage {
    /// Serialize the image to bytes (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, RewardsError> {
        bincode::serialize(self).map_err(|e| RewardsError::Image(e.to_string()))
    }

    /// Deserialize an image from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RewardsError> {
        bincode::deserialize(bytes).map_err(|e| RewardsError::Image(e.to_string()))
    }
}
