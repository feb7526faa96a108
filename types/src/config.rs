//! Chain and engine configuration.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Reference block cadence the reward and point formulas are calibrated to.
pub const DEFAULT_BLOCK_SECONDS: f64 = 10.0;

/// Base units per whole coin (10^18).
pub fn base_unit() -> BigInt {
    BigInt::from(10u64).pow(18)
}

/// Default view-change window in blocks.
const DEFAULT_EPOCH: u64 = 360;
/// Default inter-block spacing in seconds.
const DEFAULT_PERIOD: u64 = 10;
/// Default activation height for block rewards.
const DEFAULT_REWARDS_START: u64 = 500;
/// Default slash round (reserved).
const DEFAULT_SLASH_ROUND: u64 = 2;
/// Default fraction of stakers considered candidates per round.
const DEFAULT_FORK_FACTOR: f64 = 1.0;
/// Default minimum staked balance, in whole coins, to stay elected
/// after the BIP1 fork.
const DEFAULT_STAKE_MINIMUM_COINS: u64 = 100_000;
/// Default reserved cap on the staked balance, in whole coins.
const DEFAULT_LIMIT_STAKE_COINS: u64 = 5_000_000;

/// Consensus-engine parameters.
///
/// Loaded from the embedding node's configuration; zero or out-of-range
/// values are replaced with the defaults by [`EngineConfig::sanitized`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Mandatory inter-block spacing in seconds.
    pub period: u64,
    /// View-change window; also the reward-maturation distance.
    pub epoch: u64,
    /// Height at which block rewards activate.
    pub rewards_start: u64,
    /// Minimum staked balance (base units) to remain elected after BIP1.
    pub stake_minimum: BigInt,
    /// Reserved cap on staked balance (base units).
    pub limit_stake_balance: BigInt,
    /// Reserved.
    pub slash_round: u64,
    /// Fraction of stakers considered candidates per round, in (0, 1].
    pub fork_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            epoch: DEFAULT_EPOCH,
            rewards_start: DEFAULT_REWARDS_START,
            stake_minimum: BigInt::from(DEFAULT_STAKE_MINIMUM_COINS) * base_unit(),
            limit_stake_balance: BigInt::from(DEFAULT_LIMIT_STAKE_COINS) * base_unit(),
            slash_round: DEFAULT_SLASH_ROUND,
            fork_factor: DEFAULT_FORK_FACTOR,
        }
    }
}

impl EngineConfig {
    /// Replace unset or invalid fields with the engine defaults.
    pub fn sanitized(mut self) -> Self {
        use num_traits::Zero;

        let defaults = Self::default();
        if self.period == 0 {
            self.period = defaults.period;
        }
        if self.epoch == 0 {
            self.epoch = defaults.epoch;
        }
        if self.rewards_start == 0 {
            self.rewards_start = defaults.rewards_start;
        }
        if self.stake_minimum.is_zero() {
            self.stake_minimum = defaults.stake_minimum;
        }
        if self.limit_stake_balance.is_zero() {
            self.limit_stake_balance = defaults.limit_stake_balance;
        }
        if self.slash_round == 0 {
            self.slash_round = defaults.slash_round;
        }
        if !(self.fork_factor > 0.0 && self.fork_factor <= 1.0) {
            self.fork_factor = defaults.fork_factor;
        }
        self
    }
}

/// Chain-wide configuration: fork-activation heights plus the engine
/// parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// BIP1: unstaking takes effect; stake-minimum pruning runs once.
    pub bip1_block: Option<u64>,
    /// BIP2: the election seed covers the full block number.
    pub bip2_block: Option<u64>,
    /// BIP3: the linear elector replaces the queue elector.
    pub bip3_block: Option<u64>,
    pub engine: EngineConfig,
}

impl ChainConfig {
    /// A configuration with every fork active from genesis; used by tests
    /// and development networks.
    pub fn dev() -> Self {
        Self {
            bip1_block: Some(0),
            bip2_block: Some(0),
            bip3_block: Some(0),
            engine: EngineConfig::default(),
        }
    }

    pub fn is_bip1(&self, number: u64) -> bool {
        self.bip1_block.is_some_and(|at| number >= at)
    }

    /// Exactly the BIP1 activation block.
    pub fn is_bip1_block(&self, number: u64) -> bool {
        self.bip1_block == Some(number)
    }

    pub fn is_bip2(&self, number: u64) -> bool {
        self.bip2_block.is_some_and(|at| number >= at)
    }

    pub fn is_bip3(&self, number: u64) -> bool {
        self.bip3_block.is_some_and(|at| number >= at)
    }
}
