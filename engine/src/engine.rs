//! The consensus engine: credentials, caches, and the prepare/seal path.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lru::LruCache;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ember_crypto::{header_hash, CryptoError, SealSignature};
use ember_election::{select_block_creator, VoteResults, MAX_MINER};
use ember_staking::StakingDb;
use ember_types::config::EngineConfig;
use ember_types::{
    Address, Block, BlockNonce, ChainReader, Hash, Header, StateView, EXTRA_SEAL, EXTRA_VANITY,
};

use crate::delay::{seal_delay, ArithmeticGroup, COMMON_DIFF};
use crate::error::EngineError;
use crate::sighash::seal_hash;

/// Recent election results kept in memory, keyed by target hash.
const INMEMORY_ELECTIONS: usize = 128;
/// Recent staker snapshots kept in memory.
const INMEMORY_STAKERS: usize = 128 * 3;
/// Recent recovered signatures kept in memory.
const INMEMORY_SIGNATURES: usize = 4096;

/// Legacy difficulty handed out while the target is still genesis.
const DIFF_WITHOUT_STAKER: i64 = 1234;

/// The staker store is pruned every this many blocks.
pub(crate) const CLEAN_CYCLE: u64 = 8640;

/// Signer callback: produce a 65-byte recoverable signature over a digest
/// on behalf of the given account.
pub type SignerFn =
    Arc<dyn Fn(Address, &Hash) -> Result<SealSignature, CryptoError> + Send + Sync>;

/// The stake-weighted sealing engine.
///
/// Owns the staker store handle, the three in-memory caches, and the local
/// signing credentials. Constructed before the miner driver starts and
/// released on [`Engine::close`].
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) staking_db: Arc<dyn StakingDb>,

    /// Serialized staker snapshots, keyed by block hash.
    pub(crate) staker_cache: Mutex<LruCache<Hash, Vec<u8>>>,
    /// Election results for recent target blocks.
    pub(crate) elections: Mutex<LruCache<Hash, Arc<VoteResults>>>,
    /// Recovered signer addresses for recent headers.
    pub(crate) signatures: Mutex<LruCache<Hash, Address>>,

    /// Local signing credentials; `None` until [`Engine::authorize`].
    signer: RwLock<Option<(Address, SignerFn)>>,

    pub(crate) rank_group: ArithmeticGroup,
}

impl Engine {
    /// Build an engine from a (possibly partial) configuration and a
    /// staker store.
    pub fn new(config: EngineConfig, staking_db: Arc<dyn StakingDb>) -> Self {
        Self {
            config: config.sanitized(),
            staking_db,
            staker_cache: Mutex::new(LruCache::new(nonzero(INMEMORY_STAKERS))),
            elections: Mutex::new(LruCache::new(nonzero(INMEMORY_ELECTIONS))),
            signatures: Mutex::new(LruCache::new(nonzero(INMEMORY_SIGNATURES))),
            signer: RwLock::new(None),
            rank_group: ArithmeticGroup {
                common_diff: COMMON_DIFF,
            },
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Inject the local signing credentials used to seal blocks.
    pub fn authorize(&self, signer: Address, sign_fn: SignerFn) {
        let mut guard = self.signer.write().expect("signer lock poisoned");
        *guard = Some((signer, sign_fn));
        tracing::info!(%signer, "sealing authorized");
    }

    pub(crate) fn signer_credentials(&self) -> Option<(Address, SignerFn)> {
        self.signer
            .read()
            .expect("signer lock poisoned")
            .as_ref()
            .map(|(addr, f)| (*addr, Arc::clone(f)))
    }

    /// The address that sealed the given header, recovered from the
    /// trailing signature in its extra-data.
    pub fn author(&self, header: &Header) -> Result<Address, EngineError> {
        self.ecrecover(header)
    }

    /// Digest the producer signs; also the pre-seal identity of a block.
    pub fn seal_hash(&self, header: &Header) -> Hash {
        seal_hash(header)
    }

    /// Release engine-owned resources. Call after the sealing task loop
    /// has exited.
    pub fn close(&self) -> Result<(), EngineError> {
        let mut guard = self.signer.write().expect("signer lock poisoned");
        *guard = None;
        Ok(())
    }

    pub(crate) fn ecrecover(&self, header: &Header) -> Result<Address, EngineError> {
        let hash = header_hash(header);
        if let Some(addr) = self
            .signatures
            .lock()
            .expect("signature cache poisoned")
            .get(&hash)
        {
            return Ok(*addr);
        }

        let seal = header
            .seal_bytes()
            .and_then(SealSignature::from_slice)
            .ok_or(EngineError::MissingSignature)?;
        let signer = ember_crypto::recover_signer(&seal_hash(header), &seal)
            .map_err(|_| EngineError::Unauthorized)?;

        self.signatures
            .lock()
            .expect("signature cache poisoned")
            .put(hash, signer);
        Ok(signer)
    }

    /// The past block whose staker set decides who may produce the child
    /// of `parent`:
    /// below one epoch — genesis; below two epochs — the epoch block;
    /// after that — the ancestor one epoch back.
    pub(crate) fn stake_target_block(
        &self,
        chain: &dyn ChainReader,
        parent: &Header,
    ) -> Result<Header, EngineError> {
        let epoch = self.config.epoch;
        let d = parent.number / epoch;
        if d > 1 {
            // Height parent.number + 1 − epoch: one epoch behind the
            // block being produced.
            return self.ancestor(chain, epoch - 1, parent);
        }

        let target_number = if d == 0 { 0 } else { epoch };
        let target = chain
            .header_by_number(target_number)
            .ok_or(EngineError::UnknownAncestor)?;
        if !chain.has_block_and_state(&header_hash(&target), target_number) {
            return Err(EngineError::UnknownAncestor);
        }
        Ok(target)
    }

    /// Walk `distance` parent links back from `header`; the result must be
    /// present with its state.
    pub(crate) fn ancestor(
        &self,
        chain: &dyn ChainReader,
        distance: u64,
        header: &Header,
    ) -> Result<Header, EngineError> {
        let target_number = header.number.saturating_sub(distance);
        let mut current = header.clone();
        while current.number > 0 && current.number > target_number {
            current = chain
                .header_by_hash(&current.parent_hash, current.number - 1)
                .ok_or(EngineError::UnknownAncestor)?;
        }
        if !chain.has_block_and_state(&header_hash(&current), current.number) {
            return Err(EngineError::UnknownAncestor);
        }
        Ok(current)
    }

    /// The accounts authorised to produce on top of `target`: the genesis
    /// signer list while the target predates the first epoch, the target's
    /// staker snapshot afterwards.
    pub(crate) fn signers_at(
        &self,
        chain: &dyn ChainReader,
        target: &Header,
    ) -> Result<Vec<Address>, EngineError> {
        if target.number == 0 {
            return signers_from_extra(target);
        }
        if target.number < self.config.epoch {
            let genesis = chain
                .header_by_number(0)
                .ok_or(EngineError::UnknownBlock)?;
            return signers_from_extra(&genesis);
        }

        let list = self.stakers(chain, target.number, &header_hash(target))?;
        Ok(list.iter().copied().collect())
    }

    /// Election results for a target block, cached per target hash.
    pub(crate) fn elect(
        &self,
        chain: &dyn ChainReader,
        target: &Header,
    ) -> Result<Arc<VoteResults>, EngineError> {
        let hash = header_hash(target);
        if let Some(results) = self
            .elections
            .lock()
            .expect("election cache poisoned")
            .get(&hash)
        {
            return Ok(Arc::clone(results));
        }

        let stakers = self.stakers(chain, target.number, &hash)?;
        let state = chain
            .state_at(&target.state_root)
            .ok_or(EngineError::MissingState)?;
        let results = Arc::new(select_block_creator(
            chain.config(),
            target.number,
            &stakers,
            state.as_ref(),
        ));

        self.elections
            .lock()
            .expect("election cache poisoned")
            .put(hash, Arc::clone(&results));
        Ok(results)
    }

    /// Score and rank of `signer` for blocks built on `target`.
    ///
    /// While the target is still genesis every listed signer shares the
    /// legacy difficulty at rank 1. Afterwards the election decides, and a
    /// rank over the fork-factor cap is as good as not being elected.
    pub(crate) fn calc_difficulty_and_rank(
        &self,
        signer: &Address,
        chain: &dyn ChainReader,
        target: &Header,
    ) -> Result<(BigInt, u32), EngineError> {
        if target.number == 0 {
            return Ok((BigInt::from(DIFF_WITHOUT_STAKER), 1));
        }

        let results = self.elect(chain, target)?;
        let max = self.max_mining_candidates(results.len());
        let result = results.get(signer).ok_or(EngineError::Unauthorized)?;
        if result.rank as usize > max {
            tracing::warn!(%signer, rank = result.rank, max, "elected out of rank");
            return Err(EngineError::Unauthorized);
        }
        Ok((result.score.clone(), result.rank))
    }

    /// Difficulty the local signer's next block should carry on top of
    /// `parent`; zero when it is not electable.
    pub fn calc_difficulty(&self, chain: &dyn ChainReader, parent: &Header) -> BigInt {
        let Some((signer, _)) = self.signer_credentials() else {
            return BigInt::from(0);
        };
        let Ok(target) = self.stake_target_block(chain, parent) else {
            return BigInt::from(0);
        };
        match self.calc_difficulty_and_rank(&signer, chain, &target) {
            Ok((diff, _)) => diff,
            Err(_) => BigInt::from(0),
        }
    }

    /// Fill in the consensus fields of a header under construction:
    /// difficulty and nonce from the election, monotone timestamp, padded
    /// extra-data, zero mix digest.
    pub fn prepare(
        &self,
        chain: &dyn ChainReader,
        header: &mut Header,
    ) -> Result<(), EngineError> {
        header.nonce = BlockNonce::ZERO;
        if header.number == 0 {
            return Err(EngineError::UnknownBlock);
        }

        let parent = chain
            .header_by_hash(&header.parent_hash, header.number - 1)
            .ok_or(EngineError::UnknownAncestor)?;
        let target = self.stake_target_block(chain, &parent)?;

        let (signer, _) = self.signer_credentials().ok_or(EngineError::Unauthorized)?;
        let (difficulty, rank) = self.calc_difficulty_and_rank(&signer, chain, &target)?;
        header.difficulty = difficulty;
        header.nonce = BlockNonce::encode(rank as u64);

        if header.extra.len() < EXTRA_VANITY {
            header.extra.resize(EXTRA_VANITY, 0);
        }
        header.extra.truncate(EXTRA_VANITY);
        header.extra.extend(std::iter::repeat(0u8).take(EXTRA_SEAL));

        header.mix_digest = Hash::ZERO;

        header.time = parent.time + self.config.period;
        let now = unix_now();
        if header.time < now {
            header.time = now;
        }
        Ok(())
    }

    /// Sign the block and emit it on `results` once the rank-derived delay
    /// has elapsed, unless cancelled first.
    ///
    /// Returns as soon as the timed task is spawned. A sealed block nobody
    /// drains within the round is dropped with a warning.
    pub fn seal(
        &self,
        chain: &dyn ChainReader,
        block: Block,
        results: mpsc::Sender<Block>,
        cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        let mut header = block.header().clone();
        if header.number == 0 {
            return Err(EngineError::UnknownBlock);
        }

        let (signer, sign_fn) = self.signer_credentials().ok_or(EngineError::Unauthorized)?;

        let parent = chain
            .header_by_hash(&header.parent_hash, header.number - 1)
            .ok_or(EngineError::UnknownAncestor)?;
        let target = self.stake_target_block(chain, &parent)?;

        let signers = self.signers_at(chain, &target)?;
        if !signers.contains(&signer) {
            return Err(EngineError::Unauthorized);
        }

        let (_, rank) = self.calc_difficulty_and_rank(&header.coinbase, chain, &target)?;

        if let Some(state) = chain.state_at(&target.state_root) {
            let ratio = self.join_ratio(&signers, &signer, state.as_ref());
            tracing::debug!(%signer, rank, ratio, "sealing slot");
        }

        // Header time was set ahead of wall-clock in prepare; sleep the
        // remainder plus the rank slot.
        let mut delay = Duration::from_secs(header.time.saturating_sub(unix_now()));
        delay += seal_delay(&self.rank_group, rank)?;

        let signature = sign_fn(signer, &seal_hash(&header)).map_err(|e| {
            tracing::warn!(%signer, error = %e, "signer backend refused the seal");
            EngineError::Unauthorized
        })?;
        let extra_len = header.extra.len();
        if extra_len < EXTRA_SEAL {
            return Err(EngineError::MissingSignature);
        }
        header.extra[extra_len - EXTRA_SEAL..].copy_from_slice(signature.as_bytes());

        tracing::trace!(rank, delay_ms = delay.as_millis() as u64, "waiting for seal slot");
        let sealed = block.with_seal(header);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if results.try_send(sealed).is_err() {
                tracing::warn!("sealing result is not read by miner");
            }
        });
        Ok(())
    }

    /// How many of the election's ranks are allowed to produce, from the
    /// configured fork factor: `clamp(round(fork_factor · holders), 1,
    /// MAX_MINER)`, zero only for an empty election.
    pub(crate) fn max_mining_candidates(&self, holders: usize) -> usize {
        if holders == 0 {
            return 0;
        }
        let scaled = (self.config.fork_factor * holders as f64).round() as usize;
        scaled.max(1).min(MAX_MINER)
    }

    /// An address's share of the total Selection Point. Observational
    /// only; never gates sealing.
    pub fn join_ratio(
        &self,
        stakers: &[Address],
        address: &Address,
        state: &dyn StateView,
    ) -> f64 {
        let mut total = 0.0;
        let mut own = 0.0;
        for staker in stakers {
            let point = state.point(staker).to_f64().unwrap_or(0.0);
            if staker == address {
                own = point;
            }
            total += point;
        }
        if total == 0.0 {
            return 0.0;
        }
        own / total
    }
}

/// Parse the signer list out of a header's extra-data; at least one
/// address must be present.
pub(crate) fn signers_from_extra(header: &Header) -> Result<Vec<Address>, EngineError> {
    let section = header.signer_section().ok_or(EngineError::ExtraSigners)?;
    if section.is_empty() || section.len() % Address::LENGTH != 0 {
        return Err(EngineError::ExtraSigners);
    }
    Ok(section
        .chunks(Address::LENGTH)
        .filter_map(Address::from_slice)
        .collect())
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

fn nonzero(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).expect("cache capacity must be non-zero")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::{EXTRA_SEAL, EXTRA_VANITY};

    fn extra_with_signers(count: usize) -> Vec<u8> {
        let mut extra = vec![0u8; EXTRA_VANITY];
        for i in 0..count {
            extra.extend_from_slice(&[i as u8 + 1; Address::LENGTH]);
        }
        extra.extend_from_slice(&[0u8; EXTRA_SEAL]);
        extra
    }

    #[test]
    fn signer_extraction_from_extra() {
        let header = Header {
            extra: extra_with_signers(3),
            ..Header::default()
        };
        let signers = signers_from_extra(&header).unwrap();
        assert_eq!(signers.len(), 3);
        assert_eq!(signers[0], Address::new([1; 20]));
        assert_eq!(signers[2], Address::new([3; 20]));
    }

    #[test]
    fn empty_signer_section_is_rejected() {
        let header = Header {
            extra: extra_with_signers(0),
            ..Header::default()
        };
        assert!(matches!(
            signers_from_extra(&header),
            Err(EngineError::ExtraSigners)
        ));
    }

    #[test]
    fn fork_factor_caps_candidates() {
        let db: Arc<dyn StakingDb> = Arc::new(NoopDb);
        let engine = Engine::new(
            EngineConfig {
                fork_factor: 0.5,
                ..EngineConfig::default()
            },
            db,
        );
        assert_eq!(engine.max_mining_candidates(0), 0);
        assert_eq!(engine.max_mining_candidates(1), 1);
        assert_eq!(engine.max_mining_candidates(10), 5);
        assert_eq!(engine.max_mining_candidates(100_000), MAX_MINER);
    }

    struct NoopDb;

    impl StakingDb for NoopDb {
        fn stakers(
            &self,
            hash: &Hash,
        ) -> Result<ember_staking::StakerSet, ember_staking::StakingError> {
            Err(ember_staking::StakingError::NotFound(hash.to_hex()))
        }

        fn commit(
            &self,
            _hash: &Hash,
            _stakers: &ember_staking::StakerSet,
        ) -> Result<(), ember_staking::StakingError> {
            Ok(())
        }

        fn clean(
            &self,
            _keep: &Hash,
            _stakers: &ember_staking::StakerSet,
        ) -> Result<(), ember_staking::StakingError> {
            Ok(())
        }
    }
}
