use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("insufficient allowance: need {needed}, approved {approved}")]
    InsufficientAllowance { needed: u128, approved: u128 },

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    #[error("mint would exceed max supply {max_supply}")]
    MaxSupplyExceeded { max_supply: u128 },

    #[error("transfer timed out")]
    Timeout,

    #[error("transfer rejected: {0}")]
    Rejected(String),
}
