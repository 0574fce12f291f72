//! The ledger store: balances, totals and invariant-checked mutations.

use std::collections::HashMap;

use stakepool_types::{AccountId, Timestamp};

use crate::account::ParticipantAccount;
use crate::error::LedgerError;
use crate::pool::PoolState;
use crate::snapshot::{LedgerImage, Savepoint};

/// Signed change to a participant's staked balance.
///
/// Kept as two unsigned variants so the full `u128` range is representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceDelta {
    Increase(u128),
    Decrease(u128),
}

/// In-memory ledger for one pool.
///
/// Every mutating method either applies completely or leaves the store
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct LedgerStore {
    accounts: HashMap<AccountId, ParticipantAccount>,
    pool: PoolState,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Staked balance of `participant` (zero when never seen).
    pub fn get_balance(&self, participant: &AccountId) -> u128 {
        self.accounts
            .get(participant)
            .map(|a| a.staked_balance)
            .unwrap_or(0)
    }

    pub fn get_total_supply(&self) -> u128 {
        self.pool.total_staked_supply
    }

    /// Full record for `participant`, defaulting when absent.
    pub fn account(&self, participant: &AccountId) -> ParticipantAccount {
        self.accounts.get(participant).cloned().unwrap_or_default()
    }

    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    /// Number of participants with a non-empty record.
    pub fn participant_count(&self) -> usize {
        self.accounts.len()
    }

    /// Apply a stake-balance change to `participant` and the pool total.
    ///
    /// Decreasing below zero is an invariant violation, not a caller error:
    /// callers must validate the amount against the balance first.
    pub fn apply_delta(
        &mut self,
        participant: &AccountId,
        delta: BalanceDelta,
    ) -> Result<(), LedgerError> {
        let mut account = self.account(participant);
        let total = self.pool.total_staked_supply;

        let (balance, total) = match delta {
            BalanceDelta::Increase(amount) => (
                account
                    .staked_balance
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow)?,
                total.checked_add(amount).ok_or(LedgerError::Overflow)?,
            ),
            BalanceDelta::Decrease(amount) => (
                account.staked_balance.checked_sub(amount).ok_or_else(|| {
                    LedgerError::InvariantViolation(format!(
                        "balance of {participant} would go negative: {} - {amount}",
                        account.staked_balance
                    ))
                })?,
                total.checked_sub(amount).ok_or_else(|| {
                    LedgerError::InvariantViolation(format!(
                        "total staked supply would go negative: {total} - {amount}"
                    ))
                })?,
            ),
        };

        account.staked_balance = balance;
        self.pool.total_staked_supply = total;
        self.put_account(participant, account);
        Ok(())
    }

    /// Settle accrual for `participant`: record the new pending reward and
    /// move the checkpoint to `at`.
    pub fn checkpoint(&mut self, participant: &AccountId, pending_reward: u128, at: Timestamp) {
        let mut account = self.account(participant);
        account.pending_reward = pending_reward;
        account.last_checkpoint = at;
        if at > self.pool.last_global_update {
            self.pool.last_global_update = at;
        }
        self.put_account(participant, account);
    }

    /// Credit reward-asset units that have arrived in custody.
    pub fn fund_rewards(&mut self, amount: u128) -> Result<(), LedgerError> {
        let remaining = self
            .pool
            .reward_pool_remaining
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let funded = self
            .pool
            .total_reward_funded
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.pool.reward_pool_remaining = remaining;
        self.pool.total_reward_funded = funded;
        Ok(())
    }

    /// Record a reward payout from the pool.
    ///
    /// Paying more than remains would fabricate rewards and is rejected as an
    /// invariant violation.
    pub fn pay_reward(&mut self, amount: u128) -> Result<(), LedgerError> {
        let remaining = self
            .pool
            .reward_pool_remaining
            .checked_sub(amount)
            .ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "reward payout {amount} exceeds pool remaining {}",
                    self.pool.reward_pool_remaining
                ))
            })?;
        let paid = self
            .pool
            .total_reward_paid
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.pool.reward_pool_remaining = remaining;
        self.pool.total_reward_paid = paid;
        Ok(())
    }

    /// Capture the state an operation on `participant` may touch.
    pub fn snapshot(&self, participant: &AccountId) -> Savepoint {
        Savepoint {
            participant: participant.clone(),
            account: self.accounts.get(participant).cloned(),
            pool: self.pool.clone(),
        }
    }

    /// Roll back to a savepoint taken by [`LedgerStore::snapshot`].
    pub fn restore(&mut self, savepoint: Savepoint) {
        match savepoint.account {
            Some(account) => {
                self.accounts.insert(savepoint.participant, account);
            }
            None => {
                self.accounts.remove(&savepoint.participant);
            }
        }
        self.pool = savepoint.pool;
    }

    /// Full scan of the ledger invariants.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let mut sum: u128 = 0;
        for account in self.accounts.values() {
            sum = sum.checked_add(account.staked_balance).ok_or_else(|| {
                LedgerError::InvariantViolation("sum of balances overflows".into())
            })?;
        }
        if sum != self.pool.total_staked_supply {
            return Err(LedgerError::InvariantViolation(format!(
                "total staked supply {} != sum of balances {sum}",
                self.pool.total_staked_supply
            )));
        }

        let pool = &self.pool;
        if pool.total_reward_paid > pool.total_reward_funded {
            return Err(LedgerError::InvariantViolation(format!(
                "rewards paid {} exceed rewards funded {}",
                pool.total_reward_paid, pool.total_reward_funded
            )));
        }
        if pool.total_reward_funded - pool.total_reward_paid != pool.reward_pool_remaining {
            return Err(LedgerError::InvariantViolation(format!(
                "reward pool remaining {} != funded {} - paid {}",
                pool.reward_pool_remaining, pool.total_reward_funded, pool.total_reward_paid
            )));
        }
        Ok(())
    }

    /// Export the complete ledger state.
    pub fn image(&self) -> LedgerImage {
        let mut accounts: Vec<_> = self
            .accounts
            .iter()
            .map(|(id, account)| (id.clone(), account.clone()))
            .collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));
        LedgerImage {
            accounts,
            pool: self.pool.clone(),
        }
    }

    /// Rebuild a store from an image, refusing images that break invariants.
    pub fn from_image(image: LedgerImage) -> Result<Self, LedgerError> {
        let store = Self {
            accounts: image
                .accounts
                .into_iter()
                .filter(|(_, account)| !account.is_empty())
                .collect(),
            pool: image.pool,
        };
        store.check_invariants()?;
        Ok(store)
    }

    fn put_account(&mut self, participant: &AccountId, account: ParticipantAccount) {
        if account.is_empty() {
            self.accounts.remove(participant);
        } else {
            self.accounts.insert(participant.clone(), account);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> AccountId {
        AccountId::new(name)
    }

    #[test]
    fn absent_participant_reads_as_zero() {
        let store = LedgerStore::new();
        assert_eq!(store.get_balance(&id("ghost")), 0);
        assert_eq!(store.account(&id("ghost")), ParticipantAccount::default());
        assert_eq!(store.get_total_supply(), 0);
    }

    #[test]
    fn increase_and_decrease_track_total() {
        let mut store = LedgerStore::new();
        store.apply_delta(&id("a"), BalanceDelta::Increase(100)).unwrap();
        store.apply_delta(&id("b"), BalanceDelta::Increase(40)).unwrap();
        store.apply_delta(&id("a"), BalanceDelta::Decrease(50)).unwrap();

        assert_eq!(store.get_balance(&id("a")), 50);
        assert_eq!(store.get_balance(&id("b")), 40);
        assert_eq!(store.get_total_supply(), 90);
        store.check_invariants().unwrap();
    }

    #[test]
    fn decrease_below_zero_is_invariant_violation_and_leaves_state() {
        let mut store = LedgerStore::new();
        store.apply_delta(&id("a"), BalanceDelta::Increase(10)).unwrap();

        let err = store
            .apply_delta(&id("a"), BalanceDelta::Decrease(11))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
        assert_eq!(store.get_balance(&id("a")), 10);
        assert_eq!(store.get_total_supply(), 10);
    }

    #[test]
    fn increase_overflow_is_rejected_without_mutation() {
        let mut store = LedgerStore::new();
        store
            .apply_delta(&id("a"), BalanceDelta::Increase(u128::MAX))
            .unwrap();
        let err = store
            .apply_delta(&id("b"), BalanceDelta::Increase(1))
            .unwrap_err();
        assert_eq!(err, LedgerError::Overflow);
        assert_eq!(store.get_balance(&id("b")), 0);
        assert_eq!(store.get_total_supply(), u128::MAX);
    }

    #[test]
    fn zero_balance_account_is_pruned() {
        let mut store = LedgerStore::new();
        store.apply_delta(&id("a"), BalanceDelta::Increase(5)).unwrap();
        store.apply_delta(&id("a"), BalanceDelta::Decrease(5)).unwrap();
        assert_eq!(store.participant_count(), 0);
    }

    #[test]
    fn pending_reward_keeps_account_alive() {
        let mut store = LedgerStore::new();
        store.apply_delta(&id("a"), BalanceDelta::Increase(5)).unwrap();
        store.checkpoint(&id("a"), 7, Timestamp::new(10));
        store.apply_delta(&id("a"), BalanceDelta::Decrease(5)).unwrap();

        assert_eq!(store.participant_count(), 1);
        assert_eq!(store.account(&id("a")).pending_reward, 7);
        assert_eq!(store.pool().last_global_update, Timestamp::new(10));
    }

    #[test]
    fn restore_undoes_staged_mutation() {
        let mut store = LedgerStore::new();
        store.apply_delta(&id("a"), BalanceDelta::Increase(20)).unwrap();
        store.fund_rewards(1_000).unwrap();

        let savepoint = store.snapshot(&id("a"));
        store.apply_delta(&id("a"), BalanceDelta::Increase(30)).unwrap();
        store.checkpoint(&id("a"), 99, Timestamp::new(50));
        store.pay_reward(99).unwrap();
        store.restore(savepoint);

        assert_eq!(store.get_balance(&id("a")), 20);
        assert_eq!(store.account(&id("a")).pending_reward, 0);
        assert_eq!(store.pool().reward_pool_remaining, 1_000);
        assert_eq!(store.pool().total_reward_paid, 0);
        store.check_invariants().unwrap();
    }

    #[test]
    fn restore_removes_account_created_after_snapshot() {
        let mut store = LedgerStore::new();
        let savepoint = store.snapshot(&id("new"));
        store.apply_delta(&id("new"), BalanceDelta::Increase(1)).unwrap();
        store.restore(savepoint);
        assert_eq!(store.participant_count(), 0);
        assert_eq!(store.get_total_supply(), 0);
    }

    #[test]
    fn pay_reward_cannot_exceed_remaining() {
        let mut store = LedgerStore::new();
        store.fund_rewards(10).unwrap();
        let err = store.pay_reward(11).unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
        store.pay_reward(10).unwrap();
        assert_eq!(store.pool().reward_pool_remaining, 0);
        assert_eq!(store.pool().total_reward_paid, 10);
        store.check_invariants().unwrap();
    }

    #[test]
    fn image_roundtrip_preserves_state() {
        let mut store = LedgerStore::new();
        store.apply_delta(&id("b"), BalanceDelta::Increase(3)).unwrap();
        store.apply_delta(&id("a"), BalanceDelta::Increase(4)).unwrap();
        store.fund_rewards(50).unwrap();

        let image = store.image();
        assert_eq!(image.accounts[0].0, id("a"));
        let bytes = image.to_bytes().unwrap();
        let restored = LedgerStore::from_image(LedgerImage::from_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(restored.get_balance(&id("a")), 4);
        assert_eq!(restored.get_total_supply(), 7);
        assert_eq!(restored.pool().reward_pool_remaining, 50);
    }

    #[test]
    fn corrupt_image_is_rejected() {
        let mut image = LedgerStore::new().image();
        image.pool.total_staked_supply = 1;
        let err = LedgerStore::from_image(image).unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
    }
}
