//! Rewards-engine errors.

use stakepool_asset::AssetError;
use stakepool_ledger::LedgerError;
use stakepool_types::AccountId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardsError {
    #[error("{0}")]
    InvalidAmount(&'static str),

    #[error("account '{0}' cannot take part in the pool")]
    InvalidParticipant(AccountId),

    #[error("staking and reward assets must be distinct backends, both are {0}")]
    SharedAsset(String),

    #[error("Unstake amount exceeds balance: requested {requested}, staked {available}")]
    InsufficientBalance { requested: u128, available: u128 },

    #[error("{asset} transfer failed: {source}")]
    TransferFailed {
        asset: String,
        #[source]
        source: AssetError,
    },

    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error("arithmetic overflow in pool accounting")]
    Overflow,

    #[error("pool halted after invariant violation: {0}")]
    PoolPoisoned(String),

    #[error("rate change timestamp must not precede current segment start")]
    InvalidTimestamp,

    #[error("pool image error: {0}")]
    Image(String),
}

impl From<LedgerError> for RewardsError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvariantViolation(reason) => Self::InvariantViolation(reason),
            LedgerError::Overflow => Self::Overflow,
            LedgerError::Serialization(reason) => Self::Image(reason),
        }
    }
}
