use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Rewards(#[from] stakepool_rewards::RewardsError),

    #[error("config error: {0}")]
    Config(String),

    #[error("pool lock poisoned by a panicked operation")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
