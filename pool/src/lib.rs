//! Staking-pool service.
//!
//! Wraps a [`RewardsEngine`](stakepool_rewards::RewardsEngine) behind a single
//! mutex so every operation, including its external transfer, runs to
//! completion before the next one starts. Also owns configuration loading,
//! logging setup and operation statistics.

pub mod config;
pub mod error;
pub mod logging;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use logging::{init_logging, LogFormat};
pub use pool::StakingPool;
