//! Per-hash staker snapshots: cache, store, and ancestor replay.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::Zero;

use ember_crypto::header_hash;
use ember_staking::{calc_point, StakerSet};
use ember_types::config::base_unit;
use ember_types::{Address, Block, ChainReader, Hash, Header, StateView, Transaction};

use crate::engine::Engine;
use crate::error::EngineError;

/// Upper bound on the backward walk during reconstruction. A colder
/// lookup than this surfaces `UnknownAncestor` instead of scanning the
/// whole chain.
const MAX_REPLAY_DEPTH: usize = 8192;

impl Engine {
    /// The staker set valid *after* applying the block `(hash, number)`.
    ///
    /// Lookup order: in-memory cache, then the staker store, then
    /// reconstruction — walk parent links until a known snapshot (or
    /// genesis, which is empty) and replay the passed blocks' transactions
    /// forward. Reconstructed sets are written back to cache and store.
    /// The returned set is always the caller's own copy.
    pub fn stakers(
        &self,
        chain: &dyn ChainReader,
        number: u64,
        hash: &Hash,
    ) -> Result<StakerSet, EngineError> {
        let mut blocks: Vec<Block> = Vec::new();
        let mut prev_num = number;
        let mut prev_hash = *hash;

        let mut list = loop {
            if let Some(set) = self.cached_stakers(&prev_hash) {
                break set;
            }
            if prev_num == 0 {
                break StakerSet::new();
            }
            if let Ok(set) = self.staking_db.stakers(&prev_hash) {
                break set;
            }
            if blocks.len() >= MAX_REPLAY_DEPTH {
                tracing::warn!(start = %hash, depth = blocks.len(), "staker replay depth exceeded");
                return Err(EngineError::UnknownAncestor);
            }

            let block = chain
                .block(&prev_hash, prev_num)
                .ok_or(EngineError::UnknownAncestor)?;
            prev_num -= 1;
            prev_hash = block.header().parent_hash;
            blocks.push(block);
        };

        if blocks.is_empty() {
            return Ok(list);
        }

        // Oldest first, then apply each block's staking transactions.
        blocks.reverse();
        for block in &blocks {
            self.set_stakers_with_txs(None, chain, &mut list, block.transactions(), block.header())?;
        }

        self.put_snapshot(hash, &list)?;
        Ok(list)
    }

    /// Persist a snapshot to both the cache and the store.
    pub fn put_snapshot(&self, hash: &Hash, stakers: &StakerSet) -> Result<(), EngineError> {
        let bytes = serde_json::to_vec(stakers)
            .map_err(|e| EngineError::StakingList(e.to_string()))?;
        self.staker_cache
            .lock()
            .expect("staker cache poisoned")
            .put(*hash, bytes);
        self.staking_db
            .commit(hash, stakers)
            .map_err(|e| EngineError::StakingList(e.to_string()))?;
        Ok(())
    }

    fn cached_stakers(&self, hash: &Hash) -> Option<StakerSet> {
        let mut cache = self.staker_cache.lock().expect("staker cache poisoned");
        let bytes = cache.get(hash)?;
        match serde_json::from_slice(bytes) {
            Ok(set) => Some(set),
            Err(_) => {
                cache.pop(hash);
                None
            }
        }
    }

    /// Apply one block's transactions to the staker set.
    ///
    /// `Main → Stake` adds the sender, `Stake → Main` removes it once BIP1
    /// is active. With `state` present (the live finalize path) each
    /// touched sender's Selection Point is recomputed from its prior and
    /// current whole-coin stake and written back into account state; the
    /// replay path passes `None` and only the membership changes.
    pub(crate) fn set_stakers_with_txs(
        &self,
        mut state: Option<&mut dyn StateView>,
        chain: &dyn ChainReader,
        stakers: &mut StakerSet,
        txs: &[Transaction],
        header: &Header,
    ) -> Result<(), EngineError> {
        let number = header.number;
        if number == 0 {
            return Err(EngineError::UnknownAncestor);
        }
        let parent = chain
            .header_by_hash(&header.parent_hash, number - 1)
            .ok_or(EngineError::UnknownAncestor)?;
        let prev_state = chain
            .state_at(&parent.state_root)
            .ok_or(EngineError::MissingState)?;

        // Last write per sender wins; applied in address order so replay
        // is reproducible.
        let mut changed: BTreeMap<Address, bool> = BTreeMap::new();
        for tx in txs {
            if tx.is_transfer() {
                continue;
            }
            if chain.config().is_bip1(number) && tx.is_unstake() {
                changed.insert(tx.from, false);
            } else if tx.is_stake() {
                changed.insert(tx.from, true);
            }
        }

        for (addr, is_add) in &changed {
            if let Some(state) = state.as_deref_mut() {
                let mut point = BigInt::zero();
                let current = state.stake_balance(addr);
                if current > BigInt::zero() {
                    let unit = base_unit();
                    let current_coins = &current / &unit;
                    let prev_coins = prev_state.stake_balance(addr) / &unit;
                    let added = &current_coins - &prev_coins;
                    let last_stake_block = state.stake_updated(addr);
                    point = calc_point(
                        &prev_coins,
                        &added,
                        &BigInt::from(number),
                        &last_stake_block,
                        self.config.period,
                    );
                }
                state.set_point(addr, point);
            }

            if *is_add {
                stakers.put(*addr);
            } else {
                stakers.remove(addr);
            }
        }
        Ok(())
    }

    /// One-shot pruning at the BIP1 activation block: drop every staker
    /// whose staked balance sits under the configured minimum, then
    /// persist the pruned set for the parent hash.
    pub(crate) fn support_bip1(
        &self,
        chain: &dyn ChainReader,
        parent: &Header,
        mut stakers: StakerSet,
    ) -> Result<StakerSet, EngineError> {
        let state = chain
            .state_at(&parent.state_root)
            .ok_or(EngineError::Bip1)?;

        let members: Vec<Address> = stakers.iter().copied().collect();
        for addr in members {
            if state.stake_balance(&addr) < self.config.stake_minimum {
                stakers.remove(&addr);
            }
        }

        self.put_snapshot(&header_hash(parent), &stakers)
            .map_err(|_| EngineError::Bip1)?;
        Ok(stakers)
    }
}
