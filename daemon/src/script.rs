//! Operation scripts and the simulator that replays them.
//!
//! A script is a TOML document listing steps; each step is one pool
//! operation or one action on the simulated world (mint, approve, advance
//! the clock). The pool runs against in-memory tokens and a deterministic
//! clock, so a script always produces the same events.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stakepool_asset::AssetTransfer;
use stakepool_nullables::{NullClock, NullToken};
use stakepool_pool::{PoolConfig, StakingPool};
use stakepool_rewards::{PoolAssets, PoolEvent, PoolImage};
use stakepool_types::{AccountId, Clock};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Script {
    /// Clock reading when the pool is created.
    #[serde(default)]
    pub start_time: u64,
    /// Max supply of each simulated token.
    #[serde(default = "default_max_supply")]
    pub max_supply: u64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_max_supply() -> u64 {
    u64::MAX
}

impl Script {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid script")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Staking,
    Reward,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Mint { asset: AssetKind, to: String, amount: u64 },
    Approve { asset: AssetKind, owner: String, amount: u64 },
    Stake { who: String, amount: u64 },
    Unstake { who: String, amount: u64 },
    GetReward { who: String },
    Fund { who: String, amount: u64 },
    Sync,
    Advance { secs: u64 },
    SetRate { rate: u64 },
}

/// Result of replaying one step.
#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub events: Vec<PoolEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ParticipantReport {
    pub id: AccountId,
    pub staked: u128,
    pub pending_reward: u128,
    pub staking_wallet: u128,
    pub reward_wallet: u128,
}

/// Final state of a simulation.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub time: u64,
    pub rate: u128,
    pub total_supply: u128,
    pub reward_pool_remaining: u128,
    pub total_reward_funded: u128,
    pub total_reward_paid: u128,
    pub participants: Vec<ParticipantReport>,
    pub stats: BTreeMap<String, u64>,
}

pub struct Simulation {
    pool: StakingPool,
    staking: NullToken,
    reward: NullToken,
    clock: Arc<NullClock>,
    accounts: BTreeSet<AccountId>,
    events: Arc<Mutex<Vec<PoolEvent>>>,
}

impl Simulation {
    pub fn new(config: &PoolConfig, script: &Script) -> anyhow::Result<Self> {
        let custody = AccountId::new(config.custody.as_str());
        let max_supply = u128::from(script.max_supply);
        let staking = NullToken::new(config.staking_asset.as_str(), custody.clone(), max_supply);
        let reward = NullToken::new(config.reward_asset.as_str(), custody, max_supply);
        let clock = Arc::new(NullClock::new(script.start_time));
        let assets = PoolAssets {
            staking: Arc::new(staking.clone()),
            reward: Arc::new(reward.clone()),
        };
        let pool = StakingPool::from_config(config, assets, clock.clone())?;

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        pool.subscribe(Box::new(move |event| {
            if let Ok(mut queue) = sink.lock() {
                queue.push(event.clone());
            }
        }))?;

        Ok(Self {
            pool,
            staking,
            reward,
            clock,
            accounts: BTreeSet::new(),
            events,
        })
    }

    /// Replay `steps` in order. Failed steps are reported and skipped unless
    /// `strict`, in which case the first failure aborts the run.
    pub fn run(&mut self, steps: &[Step], strict: bool) -> anyhow::Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let result = self.apply(step);
            let events = self.drain_events();
            if strict {
                result.with_context(|| format!("step {index} ({step:?}) failed"))?;
                outcomes.push(StepOutcome {
                    index,
                    step: step.clone(),
                    error: None,
                    events,
                });
                continue;
            }
            outcomes.push(StepOutcome {
                index,
                step: step.clone(),
                error: result.err().map(|e| format!("{e:#}")),
                events,
            });
        }
        Ok(outcomes)
    }

    pub fn apply(&mut self, step: &Step) -> anyhow::Result<()> {
        match step {
            Step::Mint { asset, to, amount } => {
                let to = self.account(to);
                self.token(*asset).mint(&to, u128::from(*amount))?;
            }
            Step::Approve {
                asset,
                owner,
                amount,
            } => {
                let owner = self.account(owner);
                self.token(*asset).approve(&owner, u128::from(*amount));
            }
            Step::Stake { who, amount } => {
                let who = self.account(who);
                self.pool.stake(&who, u128::from(*amount))?;
            }
            Step::Unstake { who, amount } => {
                let who = self.account(who);
                self.pool.unstake(&who, u128::from(*amount))?;
            }
            Step::GetReward { who } => {
                let who = self.account(who);
                self.pool.get_reward(&who)?;
            }
            Step::Fund { who, amount } => {
                let who = self.account(who);
                self.pool.fund_rewards(&who, u128::from(*amount))?;
            }
            Step::Sync => {
                self.pool.sync_reward_pool()?;
            }
            Step::Advance { secs } => self.clock.advance(*secs),
            Step::SetRate { rate } => self.pool.set_reward_rate(u128::from(*rate))?,
        }
        Ok(())
    }

    pub fn report(&self) -> anyhow::Result<Report> {
        let state = self.pool.pool_state()?;
        let mut participants = Vec::with_capacity(self.accounts.len());
        for id in &self.accounts {
            participants.push(ParticipantReport {
                staked: self.pool.balance_of(id)?,
                pending_reward: self.pool.pending_reward(id)?,
                staking_wallet: self.staking.balance_of(id),
                reward_wallet: self.reward.balance_of(id),
                id: id.clone(),
            });
        }
        Ok(Report {
            time: self.clock.now().as_secs(),
            rate: self.pool.current_rate()?,
            total_supply: state.total_staked_supply,
            reward_pool_remaining: state.reward_pool_remaining,
            total_reward_funded: state.total_reward_funded,
            total_reward_paid: state.total_reward_paid,
            participants,
            stats: self
                .pool
                .stats()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
    }

    pub fn image(&self) -> anyhow::Result<PoolImage> {
        Ok(self.pool.image()?)
    }

    fn account(&mut self, name: &str) -> AccountId {
        let id = AccountId::new(name);
        self.accounts.insert(id.clone());
        id
    }

    fn token(&self, asset: AssetKind) -> &NullToken {
        match asset {
            AssetKind::Staking => &self.staking,
            AssetKind::Reward => &self.reward,
        }
    }

    fn drain_events(&self) -> Vec<PoolEvent> {
        self.events
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}
