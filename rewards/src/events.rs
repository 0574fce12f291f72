//! Events emitted by the engine for subscribers.

use serde::{Deserialize, Serialize};
use stakepool_types::{AccountId, Timestamp};

/// Domain events, one per successful mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
    Staked { user: AccountId, amount: u128 },
    Unstaked { user: AccountId, amount: u128 },
    /// Only emitted for non-zero payouts.
    Rewarded { user: AccountId, amount: u128 },
    RewardFunded { funder: AccountId, amount: u128 },
    RateChanged { rate: u128, at: Timestamp },
}

/// Synchronous fan-out event bus.
///
/// Listeners run inline on the thread holding the pool; keep them fast.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&PoolEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&PoolEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &PoolEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();

        let c1 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        }));

        bus.emit(&PoolEvent::Staked {
            user: AccountId::new("alice"),
            amount: 1,
        });
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn emit_with_no_listeners_is_noop() {
        EventBus::new().emit(&PoolEvent::RateChanged {
            rate: 1,
            at: Timestamp::EPOCH,
        });
    }
}
