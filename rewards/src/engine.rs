//! Core rewards engine.

use std::sync::Arc;

use stakepool_asset::{AssetError, AssetTransfer};
use stakepool_ledger::{BalanceDelta, LedgerError, LedgerStore, ParticipantAccount, PoolState, Savepoint};
use stakepool_types::{AccountId, Clock, Timestamp};
use tracing::{debug, error, info, warn};

use crate::error::RewardsError;
use crate::events::{EventBus, PoolEvent};
use crate::image::PoolImage;
use crate::rate::RateHistory;

/// Default fixed-point scale for reward rates (10^12).
///
/// A rate of `DEFAULT_RATE_SCALE` pays one reward unit per staked unit per second.
pub const DEFAULT_RATE_SCALE: u128 = 1_000_000_000_000;

/// The two asset backends a pool moves tokens through.
#[derive(Clone)]
pub struct PoolAssets {
    pub staking: Arc<dyn AssetTransfer>,
    pub reward: Arc<dyn AssetTransfer>,
}

impl PoolAssets {
    /// Reject a pool whose two backends are the same token: staked deposits
    /// would then count as reward funding.
    fn ensure_distinct(&self) -> Result<(), RewardsError> {
        if Arc::ptr_eq(&self.staking, &self.reward)
            || self.staking.symbol() == self.reward.symbol()
        {
            return Err(RewardsError::SharedAsset(self.staking.symbol().to_string()));
        }
        Ok(())
    }
}

/// Which backend an operation moves tokens through.
#[derive(Clone, Copy)]
enum Asset {
    Staking,
    Reward,
}

/// Direction of an external transfer relative to custody.
#[derive(Clone, Copy)]
enum Flow {
    In,
    Out,
}

/// The rewards engine. Owns the ledger, settles accrual and moves tokens.
///
/// Every mutating operation follows the same shape: validate, take a
/// savepoint, stage ledger changes, audit, call the asset backend, then
/// either emit the event or restore the savepoint. Callers must serialize
/// access (`&mut self`); the pool service does so with a mutex.
pub struct RewardsEngine {
    ledger: LedgerStore,
    rate_history: RateHistory,
    rate_scale: u128,
    assets: PoolAssets,
    clock: Arc<dyn Clock>,
    events: EventBus,
    audit_invariants: bool,
    poisoned: Option<String>,
}

impl RewardsEngine {
    /// Create an empty pool accruing at `initial_rate` from the clock's current time.
    ///
    /// The staking and reward backends must be different tokens.
    pub fn new(
        assets: PoolAssets,
        clock: Arc<dyn Clock>,
        initial_rate: u128,
    ) -> Result<Self, RewardsError> {
        assets.ensure_distinct()?;
        let genesis = clock.now();
        Ok(Self {
            ledger: LedgerStore::new(),
            rate_history: RateHistory::new(initial_rate, genesis),
            rate_scale: DEFAULT_RATE_SCALE,
            assets,
            clock,
            events: EventBus::new(),
            audit_invariants: true,
            poisoned: None,
        })
    }

    /// Override the fixed-point scale applied to rates. Zero is treated as one.
    pub fn with_rate_scale(mut self, rate_scale: u128) -> Self {
        self.rate_scale = rate_scale.max(1);
        self
    }

    /// Run a full invariant scan after every staged mutation.
    ///
    /// The scan is O(participants); large pools may turn it off and rely on
    /// the per-mutation checks in the ledger.
    pub fn with_invariant_audit(mut self, enabled: bool) -> Self {
        self.audit_invariants = enabled;
        self
    }

    /// Resume a pool from an image.
    pub fn from_image(
        image: PoolImage,
        assets: PoolAssets,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RewardsError> {
        assets.ensure_distinct()?;
        let ledger = LedgerStore::from_image(image.ledger)?;
        Ok(Self {
            ledger,
            rate_history: image.rate_history,
            rate_scale: image.rate_scale.max(1),
            assets,
            clock,
            events: EventBus::new(),
            audit_invariants: true,
            poisoned: image.poisoned,
        })
    }

    /// Export the pool's complete state.
    pub fn image(&self) -> PoolImage {
        PoolImage {
            ledger: self.ledger.image(),
            rate_history: self.rate_history.clone(),
            rate_scale: self.rate_scale,
            poisoned: self.poisoned.clone(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&PoolEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    // ── Operations ─────────────────────────────────────────────────────

    /// Deposit `amount` of the staking asset from `caller` into custody.
    pub fn stake(&mut self, caller: &AccountId, amount: u128) -> Result<(), RewardsError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        if amount == 0 {
            return Err(RewardsError::InvalidAmount("Stake amount should be positive"));
        }
        let now = self.now();
        let savepoint = self.ledger.snapshot(caller);

        // Accrue at the pre-stake balance before it changes.
        self.settle(caller, now);
        self.stage(savepoint.clone(), |ledger| {
            ledger.apply_delta(caller, BalanceDelta::Increase(amount))
        })?;
        self.transfer(savepoint, Asset::Staking, Flow::In, caller, amount)?;

        info!(user = %caller, amount, total = self.ledger.get_total_supply(), "staked");
        self.events.emit(&PoolEvent::Staked {
            user: caller.clone(),
            amount,
        });
        Ok(())
    }

    /// Withdraw `amount` of previously staked asset back to `caller`.
    pub fn unstake(&mut self, caller: &AccountId, amount: u128) -> Result<(), RewardsError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        if amount == 0 {
            return Err(RewardsError::InvalidAmount("Unstake amount should be positive"));
        }
        let available = self.ledger.get_balance(caller);
        if amount > available {
            return Err(RewardsError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let now = self.now();
        let savepoint = self.ledger.snapshot(caller);

        self.settle(caller, now);
        self.stage(savepoint.clone(), |ledger| {
            ledger.apply_delta(caller, BalanceDelta::Decrease(amount))
        })?;
        self.transfer(savepoint, Asset::Staking, Flow::Out, caller, amount)?;

        info!(user = %caller, amount, total = self.ledger.get_total_supply(), "unstaked");
        self.events.emit(&PoolEvent::Unstaked {
            user: caller.clone(),
            amount,
        });
        Ok(())
    }

    /// Claim everything `caller` has accrued, up to what the reward pool holds.
    ///
    /// Returns the amount paid. A zero claim transfers nothing and emits no
    /// event; any excess over the pool stays pending for a later claim.
    pub fn get_reward(&mut self, caller: &AccountId) -> Result<u128, RewardsError> {
        self.ensure_live()?;
        self.ensure_participant(caller)?;
        let now = self.now();
        let owed = self.owed(&self.ledger.account(caller), now);
        let payout = owed.min(self.ledger.pool().reward_pool_remaining);
        let savepoint = self.ledger.snapshot(caller);

        self.ledger.checkpoint(caller, owed - payout, now);
        if payout == 0 {
            debug!(user = %caller, owed, "nothing to pay");
            return Ok(0);
        }
        self.stage(savepoint.clone(), |ledger| ledger.pay_reward(payout))?;
        self.transfer(savepoint, Asset::Reward, Flow::Out, caller, payout)?;

        info!(
            user = %caller,
            amount = payout,
            carried = owed - payout,
            remaining = self.ledger.pool().reward_pool_remaining,
            "rewarded"
        );
        self.events.emit(&PoolEvent::Rewarded {
            user: caller.clone(),
            amount: payout,
        });
        Ok(payout)
    }

    /// Pull `amount` of the reward asset from `funder` into the reward pool.
    pub fn fund_rewards(&mut self, funder: &AccountId, amount: u128) -> Result<(), RewardsError> {
        self.ensure_live()?;
        self.ensure_participant(funder)?;
        if amount == 0 {
            return Err(RewardsError::InvalidAmount("Funding amount should be positive"));
        }
        let savepoint = self.ledger.snapshot(funder);
        self.stage(savepoint.clone(), |ledger| ledger.fund_rewards(amount))?;
        self.transfer(savepoint, Asset::Reward, Flow::In, funder, amount)?;

        info!(funder = %funder, amount, "reward pool funded");
        self.events.emit(&PoolEvent::RewardFunded {
            funder: funder.clone(),
            amount,
        });
        Ok(())
    }

    /// Credit reward asset that reached custody without going through
    /// [`RewardsEngine::fund_rewards`] (minted or sent directly).
    ///
    /// Returns the amount credited.
    pub fn sync_reward_pool(&mut self) -> Result<u128, RewardsError> {
        self.ensure_live()?;
        let custody = self.assets.reward.custody().clone();
        let held = self.assets.reward.balance_of(&custody);
        let surplus = held.saturating_sub(self.ledger.pool().reward_pool_remaining);
        if surplus == 0 {
            return Ok(0);
        }
        let savepoint = self.ledger.snapshot(&custody);
        self.stage(savepoint, |ledger| ledger.fund_rewards(surplus))?;

        info!(amount = surplus, "reward pool synced with custody");
        self.events.emit(&PoolEvent::RewardFunded {
            funder: custody,
            amount: surplus,
        });
        Ok(surplus)
    }

    /// Switch to a new reward rate from now on. Earlier accrual is unaffected.
    pub fn set_reward_rate(&mut self, rate: u128) -> Result<(), RewardsError> {
        self.ensure_live()?;
        let now = self.now();
        self.rate_history.apply_rate_change(rate, now)?;
        info!(rate, at = %now, "reward rate changed");
        self.events.emit(&PoolEvent::RateChanged { rate, at: now });
        Ok(())
    }

    // ── Views ──────────────────────────────────────────────────────────

    pub fn total_supply(&self) -> u128 {
        self.ledger.get_total_supply()
    }

    pub fn balance_of(&self, participant: &AccountId) -> u128 {
        self.ledger.get_balance(participant)
    }

    /// Reward `participant` would be owed if they claimed now, before the pool cap.
    pub fn pending_reward(&self, participant: &AccountId) -> u128 {
        self.owed(&self.ledger.account(participant), self.now())
    }

    pub fn reward_pool_remaining(&self) -> u128 {
        self.ledger.pool().reward_pool_remaining
    }

    pub fn current_rate(&self) -> u128 {
        self.rate_history.current_rate()
    }

    pub fn rate_scale(&self) -> u128 {
        self.rate_scale
    }

    pub fn pool_state(&self) -> &PoolState {
        self.ledger.pool()
    }

    pub fn account(&self, participant: &AccountId) -> ParticipantAccount {
        self.ledger.account(participant)
    }

    pub fn participant_count(&self) -> usize {
        self.ledger.participant_count()
    }

    pub fn assets(&self) -> &PoolAssets {
        &self.assets
    }

    /// Whether the full invariant scan runs after every mutation.
    pub fn invariant_audit(&self) -> bool {
        self.audit_invariants
    }

    /// Reason the pool was halted, if it was.
    pub fn poisoned(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    /// Run a full invariant scan without mutating anything.
    pub fn check_invariants(&self) -> Result<(), RewardsError> {
        self.ledger.check_invariants().map_err(RewardsError::from)
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn ensure_live(&self) -> Result<(), RewardsError> {
        match &self.poisoned {
            Some(reason) => Err(RewardsError::PoolPoisoned(reason.clone())),
            None => Ok(()),
        }
    }

    /// Custody accounts cannot act on their own pool: a transfer from custody
    /// to itself moves nothing while the ledger would still count it.
    fn ensure_participant(&self, who: &AccountId) -> Result<(), RewardsError> {
        if !who.is_valid()
            || who == self.assets.staking.custody()
            || who == self.assets.reward.custody()
        {
            return Err(RewardsError::InvalidParticipant(who.clone()));
        }
        Ok(())
    }

    /// Current time, never earlier than any checkpoint already recorded.
    fn now(&self) -> Timestamp {
        let floor = self
            .ledger
            .pool()
            .last_global_update
            .max(self.rate_history.current_start());
        let now = self.clock.now();
        if now < floor {
            warn!(clock = %now, floor = %floor, "clock behind last checkpoint, holding time");
            return floor;
        }
        now
    }

    /// Pending plus accrued since the last checkpoint.
    fn owed(&self, account: &ParticipantAccount, now: Timestamp) -> u128 {
        let per_unit = self
            .rate_history
            .accrued_per_unit(account.last_checkpoint, now);
        let accrued = scale_down(account.staked_balance, per_unit, self.rate_scale);
        account.pending_reward.saturating_add(accrued)
    }

    /// Fold accrual into `pending_reward` and move the checkpoint to `now`.
    fn settle(&mut self, participant: &AccountId, now: Timestamp) {
        let owed = self.owed(&self.ledger.account(participant), now);
        self.ledger.checkpoint(participant, owed, now);
    }

    /// Apply a ledger mutation, then audit. Restores `savepoint` on any failure
    /// and halts the pool if an invariant broke.
    fn stage<F>(&mut self, savepoint: Savepoint, mutate: F) -> Result<(), RewardsError>
    where
        F: FnOnce(&mut LedgerStore) -> Result<(), LedgerError>,
    {
        let result = mutate(&mut self.ledger).and_then(|()| {
            if self.audit_invariants {
                self.ledger.check_invariants()
            } else {
                Ok(())
            }
        });
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.ledger.restore(savepoint);
                if let LedgerError::InvariantViolation(reason) = &e {
                    error!(%reason, "ledger invariant violated, halting pool");
                    self.poisoned = Some(reason.clone());
                }
                Err(e.into())
            }
        }
    }

    /// Call the asset backend; on failure restore `savepoint`.
    fn transfer(
        &mut self,
        savepoint: Savepoint,
        asset: Asset,
        flow: Flow,
        counterparty: &AccountId,
        amount: u128,
    ) -> Result<(), RewardsError> {
        let backend = match asset {
            Asset::Staking => &self.assets.staking,
            Asset::Reward => &self.assets.reward,
        };
        let result: Result<(), AssetError> = match flow {
            Flow::In => backend.transfer_in(counterparty, amount),
            Flow::Out => backend.transfer_out(counterparty, amount),
        };
        match result {
            Ok(()) => Ok(()),
            Err(source) => {
                let symbol = backend.symbol().to_string();
                warn!(
                    asset = %symbol,
                    participant = %savepoint.participant(),
                    amount,
                    error = %source,
                    "transfer failed, rolling back"
                );
                self.ledger.restore(savepoint);
                Err(RewardsError::TransferFailed {
                    asset: symbol,
                    source,
                })
            }
        }
    }
}

/// `balance × per_unit / scale` without intermediate overflow where avoidable,
/// saturating at `u128::MAX`.
fn scale_down(balance: u128, per_unit: u128, scale: u128) -> u128 {
    let whole = (balance / scale).saturating_mul(per_unit);
    let rem = balance % scale;
    let frac = match rem.checked_mul(per_unit) {
        Some(product) => product / scale,
        None => (per_unit / scale)
            .saturating_mul(rem)
            .saturating_add((per_unit % scale).saturating_mul(rem) / scale),
    };
    whole.saturating_add(frac)
}
