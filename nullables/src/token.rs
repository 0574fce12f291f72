//! Nullable token: an in-memory fungible asset with allowances.

use stakepool_asset::{AssetError, AssetTransfer};
use stakepool_types::AccountId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct TokenState {
    balances: HashMap<AccountId, u128>,
    /// Amount each owner has authorized custody to pull.
    allowances: HashMap<AccountId, u128>,
    total_supply: u128,
    injected_failures: VecDeque<AssetError>,
}

/// An in-memory token bound to one custody account.
///
/// Clones share state, so a test can hand one clone to the pool and keep
/// another to mint, approve and inspect balances.
#[derive(Clone)]
pub struct NullToken {
    symbol: String,
    custody: AccountId,
    max_supply: u128,
    state: Arc<Mutex<TokenState>>,
}

impl NullToken {
    pub fn new(symbol: impl Into<String>, custody: AccountId, max_supply: u128) -> Self {
        Self {
            symbol: symbol.into(),
            custody,
            max_supply,
            state: Arc::new(Mutex::new(TokenState::default())),
        }
    }

    pub fn max_supply(&self) -> u128 {
        self.max_supply
    }

    pub fn total_supply(&self) -> u128 {
        self.lock().total_supply
    }

    /// Create `amount` new units for `to`, bounded by the max supply.
    pub fn mint(&self, to: &AccountId, amount: u128) -> Result<(), AssetError> {
        let mut state = self.lock();
        let supply = state
            .total_supply
            .checked_add(amount)
            .filter(|s| *s <= self.max_supply)
            .ok_or(AssetError::MaxSupplyExceeded {
                max_supply: self.max_supply,
            })?;
        state.total_supply = supply;
        *state.balances.entry(to.clone()).or_default() += amount;
        Ok(())
    }

    /// Set the amount custody may pull from `owner`.
    pub fn approve(&self, owner: &AccountId, amount: u128) {
        self.lock().allowances.insert(owner.clone(), amount);
    }

    pub fn increase_allowance(&self, owner: &AccountId, amount: u128) {
        let mut state = self.lock();
        let allowance = state.allowances.entry(owner.clone()).or_default();
        *allowance = allowance.saturating_add(amount);
    }

    pub fn allowance(&self, owner: &AccountId) -> u128 {
        self.lock().allowances.get(owner).copied().unwrap_or(0)
    }

    /// Make the next transfer (in or out) fail with `error`. Queued failures
    /// are consumed in order.
    pub fn fail_next_transfer(&self, error: AssetError) {
        self.lock().injected_failures.push_back(error);
    }

    /// Move funds directly between holders.
    pub fn transfer(&self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), AssetError> {
        let mut state = self.lock();
        if let Some(error) = state.injected_failures.pop_front() {
            return Err(error);
        }
        move_balance(&mut state, from, to, amount)
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn move_balance(
    state: &mut TokenState,
    from: &AccountId,
    to: &AccountId,
    amount: u128,
) -> Result<(), AssetError> {
    let available = state.balances.get(from).copied().unwrap_or(0);
    if available < amount {
        return Err(AssetError::InsufficientFunds {
            needed: amount,
            available,
        });
    }
    if from == to {
        return Ok(());
    }
    state.balances.insert(from.clone(), available - amount);
    // Cannot overflow: every balance is bounded by total supply.
    *state.balances.entry(to.clone()).or_default() += amount;
    Ok(())
}

impl AssetTransfer for NullToken {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn custody(&self) -> &AccountId {
        &self.custody
    }

    fn transfer_in(&self, from: &AccountId, amount: u128) -> Result<(), AssetError> {
        let mut state = self.lock();
        if let Some(error) = state.injected_failures.pop_front() {
            return Err(error);
        }
        let approved = state.allowances.get(from).copied().unwrap_or(0);
        if approved < amount {
            return Err(AssetError::InsufficientAllowance {
                needed: amount,
                approved,
            });
        }
        move_balance(&mut state, from, &self.custody, amount)?;
        state.allowances.insert(from.clone(), approved - amount);
        Ok(())
    }

    fn transfer_out(&self, to: &AccountId, amount: u128) -> Result<(), AssetError> {
        let mut state = self.lock();
        if let Some(error) = state.injected_failures.pop_front() {
            return Err(error);
        }
        move_balance(&mut state, &self.custody, to, amount)
    }

    fn balance_of(&self, account: &AccountId) -> u128 {
        self.lock().balances.get(account).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn token() -> NullToken {
        NullToken::new("STK", id("pool"), 1_000)
    }

    #[test]
    fn mint_respects_max_supply() {
        let t = token();
        t.mint(&id("alice"), 600).unwrap();
        assert_eq!(
            t.mint(&id("bob"), 401),
            Err(AssetError::MaxSupplyExceeded { max_supply: 1_000 })
        );
        assert_eq!(t.total_supply(), 600);
        assert_eq!(t.balance_of(&id("bob")), 0);
    }

    #[test]
    fn transfer_in_requires_allowance_and_consumes_it() {
        let t = token();
        t.mint(&id("alice"), 100).unwrap();
        assert!(matches!(
            t.transfer_in(&id("alice"), 10),
            Err(AssetError::InsufficientAllowance { needed: 10, approved: 0 })
        ));

        t.approve(&id("alice"), 30);
        t.transfer_in(&id("alice"), 10).unwrap();
        assert_eq!(t.balance_of(&id("alice")), 90);
        assert_eq!(t.balance_of(&id("pool")), 10);
        assert_eq!(t.allowance(&id("alice")), 20);
    }

    #[test]
    fn transfer_in_checks_funds() {
        let t = token();
        t.mint(&id("alice"), 5).unwrap();
        t.increase_allowance(&id("alice"), 50);
        assert!(matches!(
            t.transfer_in(&id("alice"), 6),
            Err(AssetError::InsufficientFunds { needed: 6, available: 5 })
        ));
        assert_eq!(t.allowance(&id("alice")), 50);
    }

    #[test]
    fn transfer_out_moves_from_custody() {
        let t = token();
        t.mint(&id("pool"), 40).unwrap();
        t.transfer_out(&id("bob"), 15).unwrap();
        assert_eq!(t.balance_of(&id("pool")), 25);
        assert_eq!(t.balance_of(&id("bob")), 15);
    }

    #[test]
    fn injected_failure_applies_once() {
        let t = token();
        t.mint(&id("pool"), 40).unwrap();
        t.fail_next_transfer(AssetError::Timeout);
        assert_eq!(t.transfer_out(&id("bob"), 1), Err(AssetError::Timeout));
        t.transfer_out(&id("bob"), 1).unwrap();
    }

    #[test]
    fn clones_share_state() {
        let t = token();
        let other = t.clone();
        t.mint(&id("alice"), 7).unwrap();
        assert_eq!(other.balance_of(&id("alice")), 7);
    }
}
