//! The serialized pool service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use stakepool_ledger::PoolState;
use stakepool_rewards::{PoolAssets, PoolEvent, PoolImage, RewardsEngine, RewardsError};
use stakepool_types::{AccountId, Clock};
use stakepool_utils::StatsCounter;
use tracing::debug;

use crate::config::PoolConfig;
use crate::PoolError;

const STAT_NAMES: &[&str] = &[
    "stake",
    "unstake",
    "claim",
    "claimed_amount",
    "fund",
    "rollback",
    "rejected",
];

/// A staking pool safe to share between threads.
///
/// One mutex guards the whole engine: an operation holds it from validation
/// through the external transfer to the emitted event, so operations never
/// interleave.
pub struct StakingPool {
    engine: Mutex<RewardsEngine>,
    stats: StatsCounter,
}

impl StakingPool {
    pub fn new(engine: RewardsEngine) -> Self {
        Self {
            engine: Mutex::new(engine),
            stats: StatsCounter::new(STAT_NAMES),
        }
    }

    /// Build an empty pool from configuration.
    pub fn from_config(
        config: &PoolConfig,
        assets: PoolAssets,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PoolError> {
        let engine = RewardsEngine::new(assets, clock, u128::from(config.reward_rate))?
            .with_rate_scale(u128::from(config.rate_scale))
            .with_invariant_audit(config.audit_invariants);
        Ok(Self::new(engine))
    }

    /// Resume a pool from a saved image.
    pub fn from_image(
        config: &PoolConfig,
        image: PoolImage,
        assets: PoolAssets,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PoolError> {
        let engine = RewardsEngine::from_image(image, assets, clock)?
            .with_invariant_audit(config.audit_invariants);
        Ok(Self::new(engine))
    }

    pub fn subscribe(
        &self,
        listener: Box<dyn Fn(&PoolEvent) + Send + Sync>,
    ) -> Result<(), PoolError> {
        self.lock()?.subscribe(listener);
        Ok(())
    }

    // ── Operations ─────────────────────────────────────────────────────

    pub fn stake(&self, caller: &AccountId, amount: u128) -> Result<(), PoolError> {
        let result = self.lock()?.stake(caller, amount);
        self.record("stake", result)
    }

    pub fn unstake(&self, caller: &AccountId, amount: u128) -> Result<(), PoolError> {
        let result = self.lock()?.unstake(caller, amount);
        self.record("unstake", result)
    }

    /// A claim that pays nothing is not counted.
    pub fn get_reward(&self, caller: &AccountId) -> Result<u128, PoolError> {
        let result = self.lock()?.get_reward(caller);
        if let Ok(0) = result {
            return Ok(0);
        }
        let paid = self.record("claim", result)?;
        self.stats
            .add("claimed_amount", u64::try_from(paid).unwrap_or(u64::MAX));
        Ok(paid)
    }

    pub fn fund_rewards(&self, funder: &AccountId, amount: u128) -> Result<(), PoolError> {
        let result = self.lock()?.fund_rewards(funder, amount);
        self.record("fund", result)
    }

    pub fn sync_reward_pool(&self) -> Result<u128, PoolError> {
        let result = self.lock()?.sync_reward_pool();
        if let Ok(0) = result {
            return Ok(0);
        }
        self.record("fund", result)
    }

    pub fn set_reward_rate(&self, rate: u128) -> Result<(), PoolError> {
        Ok(self.lock()?.set_reward_rate(rate)?)
    }

    // ── Views ──────────────────────────────────────────────────────────

    pub fn total_supply(&self) -> Result<u128, PoolError> {
        Ok(self.lock()?.total_supply())
    }

    pub fn balance_of(&self, participant: &AccountId) -> Result<u128, PoolError> {
        Ok(self.lock()?.balance_of(participant))
    }

    pub fn pending_reward(&self, participant: &AccountId) -> Result<u128, PoolError> {
        Ok(self.lock()?.pending_reward(participant))
    }

    pub fn reward_pool_remaining(&self) -> Result<u128, PoolError> {
        Ok(self.lock()?.reward_pool_remaining())
    }

    pub fn current_rate(&self) -> Result<u128, PoolError> {
        Ok(self.lock()?.current_rate())
    }

    pub fn pool_state(&self) -> Result<PoolState, PoolError> {
        Ok(self.lock()?.pool_state().clone())
    }

    pub fn image(&self) -> Result<PoolImage, PoolError> {
        Ok(self.lock()?.image())
    }

    pub fn invariant_audit(&self) -> Result<bool, PoolError> {
        Ok(self.lock()?.invariant_audit())
    }

    pub fn poisoned(&self) -> Result<Option<String>, PoolError> {
        Ok(self.lock()?.poisoned().map(str::to_owned))
    }

    /// Operation counters since the pool was created.
    pub fn stats(&self) -> HashMap<&'static str, u64> {
        self.stats.snapshot()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RewardsEngine>, PoolError> {
        self.engine.lock().map_err(|_| PoolError::LockPoisoned)
    }

    fn record<T>(&self, op: &'static str, result: Result<T, RewardsError>) -> Result<T, PoolError> {
        match &result {
            Ok(_) => self.stats.increment(op),
            Err(RewardsError::TransferFailed { .. }) => self.stats.increment("rollback"),
            Err(e) => {
                debug!(op, error = %e, "operation rejected");
                self.stats.increment("rejected");
            }
        }
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakepool_asset::{AssetError, AssetTransfer};
    use stakepool_nullables::{NullClock, NullToken};

    fn config() -> PoolConfig {
        PoolConfig {
            reward_rate: 1,
            rate_scale: 1,
            ..PoolConfig::default()
        }
    }

    fn assets(staking: &NullToken, reward: &NullToken) -> PoolAssets {
        PoolAssets {
            staking: Arc::new(staking.clone()),
            reward: Arc::new(reward.clone()),
        }
    }

    fn pool_with_tokens() -> (StakingPool, NullToken, NullToken, Arc<NullClock>) {
        let custody = AccountId::new("pool");
        let staking = NullToken::new("STK", custody.clone(), 1_000_000);
        let reward = NullToken::new("RWD", custody, 1_000_000);
        let clock = Arc::new(NullClock::new(0));
        let pool =
            StakingPool::from_config(&config(), assets(&staking, &reward), clock.clone()).unwrap();
        (pool, staking, reward, clock)
    }

    #[test]
    fn stats_count_outcomes() {
        let (pool, staking, _reward, _clock) = pool_with_tokens();
        let alice = AccountId::new("alice");
        staking.mint(&alice, 100).unwrap();
        staking.approve(&alice, 100);

        pool.stake(&alice, 0).unwrap_err();
        pool.stake(&alice, 60).unwrap();
        staking.fail_next_transfer(AssetError::Timeout);
        pool.unstake(&alice, 10).unwrap_err();
        pool.unstake(&alice, 10).unwrap();

        let stats = pool.stats();
        assert_eq!(stats["stake"], 1);
        assert_eq!(stats["unstake"], 1);
        assert_eq!(stats["rollback"], 1);
        assert_eq!(stats["rejected"], 1);
        assert_eq!(pool.total_supply().unwrap(), 50);
    }

    #[test]
    fn claim_updates_claimed_amount() {
        let (pool, staking, reward, clock) = pool_with_tokens();
        let bob = AccountId::new("bob");
        staking.mint(&bob, 10).unwrap();
        staking.approve(&bob, 10);
        reward.mint(&AccountId::new("pool"), 1_000).unwrap();
        assert_eq!(pool.sync_reward_pool().unwrap(), 1_000);

        pool.stake(&bob, 10).unwrap();
        clock.advance(3);
        assert_eq!(pool.get_reward(&bob).unwrap(), 30);
        assert_eq!(pool.stats()["claimed_amount"], 30);
        assert_eq!(pool.reward_pool_remaining().unwrap(), 970);
    }

    #[test]
    fn rewards_errors_pass_through_unchanged() {
        let (pool, _staking, _reward, _clock) = pool_with_tokens();
        let err = pool.unstake(&AccountId::new("nobody"), 1).unwrap_err();
        assert!(matches!(
            err,
            PoolError::Rewards(RewardsError::InsufficientBalance { .. })
        ));
        assert!(err.to_string().starts_with("Unstake amount exceeds balance"));
    }

    #[test]
    fn empty_claims_and_syncs_are_not_counted() {
        let (pool, staking, reward, clock) = pool_with_tokens();
        let carol = AccountId::new("carol");
        assert_eq!(pool.get_reward(&carol).unwrap(), 0);
        assert_eq!(pool.sync_reward_pool().unwrap(), 0);
        assert_eq!(pool.stats()["claim"], 0);
        assert_eq!(pool.stats()["fund"], 0);

        staking.mint(&carol, 5).unwrap();
        staking.approve(&carol, 5);
        pool.stake(&carol, 5).unwrap();
        clock.advance(2);
        // Accrued but the reward pool is empty: nothing paid.
        assert_eq!(pool.get_reward(&carol).unwrap(), 0);
        assert_eq!(pool.stats()["claim"], 0);

        reward.mint(&AccountId::new("pool"), 100).unwrap();
        assert_eq!(pool.sync_reward_pool().unwrap(), 100);
        assert_eq!(pool.get_reward(&carol).unwrap(), 10);
        assert_eq!(pool.stats()["fund"], 1);
        assert_eq!(pool.stats()["claim"], 1);
    }

    #[test]
    fn resumes_from_saved_image() {
        let (pool, staking, reward, clock) = pool_with_tokens();
        let dave = AccountId::new("dave");
        staking.mint(&dave, 50).unwrap();
        staking.approve(&dave, 50);
        reward.mint(&AccountId::new("pool"), 1_000).unwrap();
        pool.sync_reward_pool().unwrap();
        pool.stake(&dave, 40).unwrap();
        clock.advance(5);

        let bytes = pool.image().unwrap().to_bytes().unwrap();
        let image = PoolImage::from_bytes(&bytes).unwrap();
        let config = PoolConfig {
            audit_invariants: false,
            ..config()
        };
        let resumed =
            StakingPool::from_image(&config, image, assets(&staking, &reward), clock.clone())
                .unwrap();

        assert!(!resumed.invariant_audit().unwrap());
        assert!(pool.invariant_audit().unwrap());
        assert_eq!(resumed.balance_of(&dave).unwrap(), 40);
        assert_eq!(resumed.total_supply().unwrap(), 40);
        assert_eq!(resumed.pending_reward(&dave).unwrap(), 200);
        assert_eq!(resumed.reward_pool_remaining().unwrap(), 1_000);

        clock.advance(1);
        assert_eq!(resumed.get_reward(&dave).unwrap(), 240);
        resumed.unstake(&dave, 40).unwrap();
        assert_eq!(staking.balance_of(&dave), 50);
        assert_eq!(reward.balance_of(&dave), 240);
    }

    #[test]
    fn shared_asset_backend_is_refused() {
        let token = NullToken::new("STK", AccountId::new("pool"), 100);
        let err = StakingPool::from_config(
            &config(),
            assets(&token, &token),
            Arc::new(NullClock::new(0)),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            PoolError::Rewards(RewardsError::SharedAsset(_))
        ));
    }
}
