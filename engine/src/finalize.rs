//! Block finalisation: staker mutation, reward accounting, assembly.

use num_bigint::BigInt;
use num_traits::Zero;

use ember_crypto::{empty_uncle_hash, header_hash};
use ember_types::config::DEFAULT_BLOCK_SECONDS;
use ember_types::{Address, Block, ChainReader, Header, StateView, Transaction};

use crate::engine::{Engine, CLEAN_CYCLE};
use crate::error::EngineError;

/// Height (at 10 s cadence) below which the extra first-year reward pays.
const BLOCKS_AT_ONE_YEAR: f64 = 3_150_000.0;
/// Base reward in whole coins.
const DEFAULT_REWARD: f64 = 26.0;
/// First-year bonus in whole coins.
const ADDITIONAL_REWARD: f64 = 5.0;
/// Section width for the stepwise reward decay.
const SECTION_DIVISOR: f64 = 7_370_000.0;
/// Reward drop per two sections.
const GROUPING_VALUE: f64 = 0.5;

impl Engine {
    /// Apply a block's staking effects and rewards, then assemble the
    /// final (unsealed) block.
    ///
    /// Re-checks that the coinbase is an authorised, in-rank producer with
    /// the difficulty and nonce its election predicts, mutates the staker
    /// set from the block's transactions, credits the deferred reward, and
    /// pays out any matured one.
    pub fn finalize(
        &self,
        chain: &dyn ChainReader,
        header: &mut Header,
        state: &mut dyn StateView,
        txs: &[Transaction],
    ) -> Result<Block, EngineError> {
        if header.number == 0 {
            return Err(EngineError::UnknownBlock);
        }

        let mut stakers = self
            .stakers(chain, header.number - 1, &header.parent_hash)
            .map_err(|e| EngineError::StakingList(e.to_string()))?;

        if header.coinbase != Address::ZERO {
            let parent = chain
                .header_by_hash(&header.parent_hash, header.number - 1)
                .ok_or(EngineError::UnknownAncestor)?;

            if chain.config().is_bip1_block(header.number) {
                stakers = self.support_bip1(chain, &parent, stakers)?;
            }

            let target = self.stake_target_block(chain, &parent)?;

            let signers = self
                .signers_at(chain, &target)
                .map_err(|_| EngineError::Unauthorized)?;
            if !signers.contains(&header.coinbase) {
                return Err(EngineError::Unauthorized);
            }

            let (predicted, rank) =
                self.calc_difficulty_and_rank(&header.coinbase, chain, &target)?;
            if predicted != header.difficulty {
                return Err(EngineError::InvalidDifficulty);
            }
            if header.nonce.as_u64() != rank as u64 {
                return Err(EngineError::InvalidNonce);
            }

            // Periodically drop stale snapshots to bound disk usage.
            if header.number % CLEAN_CYCLE == 0 {
                let target_hash = header_hash(&target);
                let keep = self
                    .stakers(chain, target.number, &target_hash)
                    .map_err(|_| EngineError::CleanStakingDb)?;
                self.staking_db
                    .clean(&target_hash, &keep)
                    .map_err(|_| EngineError::CleanStakingDb)?;
            }
        }

        self.set_stakers_with_txs(Some(&mut *state), chain, &mut stakers, txs, header)
            .map_err(|e| match e {
                EngineError::UnknownAncestor | EngineError::MissingState => e,
                other => EngineError::StakingList(other.to_string()),
            })?;

        self.accumulate_rewards(chain, state, header);

        header.state_root = state.intermediate_root();
        header.uncle_hash = empty_uncle_hash();

        Ok(Block::new(header.clone(), txs.to_vec()))
    }

    /// The mining reward for a block height, in base units.
    ///
    /// Zero until the configured activation height. The whole-coin amount
    /// decays by half a coin every two reward sections, pays a bonus
    /// through the first year of (cadence-corrected) heights, and scales
    /// with the period correction. The decimal result is widened to base
    /// units with integer math.
    pub fn block_reward(&self, number: u64) -> BigInt {
        if number < self.config.rewards_start {
            return BigInt::zero();
        }

        let correction = self.config.period as f64 / DEFAULT_BLOCK_SECONDS;
        let corrected = number as f64 * correction;

        let additional = if corrected <= BLOCKS_AT_ONE_YEAR {
            ADDITIONAL_REWARD
        } else {
            0.0
        };

        let reward = (DEFAULT_REWARD - (corrected / SECTION_DIVISOR).round() * GROUPING_VALUE
            + additional)
            * correction;
        if reward <= 0.0 {
            return BigInt::zero();
        }

        BigInt::from((reward * 1e10) as i64) * BigInt::from(100_000_000u64)
    }

    /// Credit this block's reward into the coinbase's deferred pool, and
    /// pay out matured entries for the authorised signers of the ancestor
    /// one epoch back.
    fn accumulate_rewards(
        &self,
        chain: &dyn ChainReader,
        state: &mut dyn StateView,
        header: &Header,
    ) {
        state.add_behind_balance(&header.coinbase, header.number, self.block_reward(header.number));

        let Ok(target) = self.ancestor(chain, self.config.epoch, header) else {
            return;
        };
        let Ok(signers) = self.signers_at(chain, &target) else {
            return;
        };

        for addr in &signers {
            let Some(behind) = state.first_behind_balance(addr) else {
                continue;
            };
            if header.number < behind.number + self.config.epoch {
                continue;
            }
            if behind.balance <= BigInt::zero() {
                continue;
            }

            tracing::debug!(%addr, amount = %behind.balance, earned_at = behind.number, "deferred reward matured");
            state.add_balance(addr, behind.balance);
            state.remove_first_behind_balance(addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use ember_staking::{StakerSet, StakingDb, StakingError};
    use ember_types::config::EngineConfig;
    use ember_types::Hash;

    struct NoopDb;

    impl StakingDb for NoopDb {
        fn stakers(&self, hash: &Hash) -> Result<StakerSet, StakingError> {
            Err(StakingError::NotFound(hash.to_hex()))
        }
        fn commit(&self, _hash: &Hash, _stakers: &StakerSet) -> Result<(), StakingError> {
            Ok(())
        }
        fn clean(&self, _keep: &Hash, _stakers: &StakerSet) -> Result<(), StakingError> {
            Ok(())
        }
    }

    fn engine_with(period: u64, rewards_start: u64) -> Engine {
        Engine::new(
            EngineConfig {
                period,
                rewards_start,
                ..EngineConfig::default()
            },
            Arc::new(NoopDb),
        )
    }

    fn coins(n: f64) -> BigInt {
        BigInt::from((n * 1e10) as i64) * BigInt::from(100_000_000u64)
    }

    #[test]
    fn no_reward_before_activation() {
        let engine = engine_with(10, 500);
        assert_eq!(engine.block_reward(0), BigInt::zero());
        assert_eq!(engine.block_reward(499), BigInt::zero());
        assert!(engine.block_reward(500) > BigInt::zero());
    }

    #[test]
    fn first_year_reward_includes_bonus() {
        // Height 500 at 10 s cadence: round(500 / 7.37e6) = 0 sections,
        // so the reward is (26 + 5) coins.
        let engine = engine_with(10, 500);
        assert_eq!(engine.block_reward(500), coins(31.0));
    }

    #[test]
    fn bonus_drops_after_one_year() {
        let engine = engine_with(10, 500);
        // Past the one-year mark: bonus gone, one section elapsed.
        let number = 4_000_000;
        let expected = 26.0 - (4_000_000f64 / SECTION_DIVISOR).round() * 0.5;
        assert_eq!(engine.block_reward(number), coins(expected));
    }

    #[test]
    fn reward_clamps_at_zero_far_out() {
        let engine = engine_with(10, 500);
        // 60 sections in: 26 − 30 < 0 → clamped.
        assert_eq!(engine.block_reward(443_000_000), BigInt::zero());
    }

    #[test]
    fn period_correction_scales_reward() {
        // Twice the period means twice the per-block reward (half the
        // blocks per wall-clock year).
        let engine = engine_with(20, 500);
        assert_eq!(engine.block_reward(500), coins(62.0));
    }
}
