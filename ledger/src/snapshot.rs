//! Ledger snapshots.
//!
//! Two granularities: a [`Savepoint`] captures only what a single operation
//! can touch (one account plus the pool totals) and backs transactional
//! rollback; a [`LedgerImage`] captures everything and backs persistence.

use serde::{Deserialize, Serialize};
use stakepool_types::AccountId;

use crate::account::ParticipantAccount;
use crate::error::LedgerError;
use crate::pool::PoolState;

/// Copy of one participant's record and the pool totals.
#[derive(Clone, Debug)]
pub struct Savepoint {
    pub(crate) participant: AccountId,
    pub(crate) account: Option<ParticipantAccount>,
    pub(crate) pool: PoolState,
}

impl Savepoint {
    pub fn participant(&self) -> &AccountId {
        &self.participant
    }
}

/// Complete ledger state, accounts sorted by identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerImage {
    pub accounts: Vec<(AccountId, ParticipantAccount)>,
    pub pool: PoolState,
}

impl LedgerImage {
    /// Serialize the image to bytes (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        bincode::serialize(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Deserialize an image from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        bincode::deserialize(bytes).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}
