//! Header and seal verification.

use ember_crypto::{empty_uncle_hash, header_hash};
use ember_types::{Address, ChainReader, Header, EXTRA_SEAL, EXTRA_VANITY};

use crate::engine::{unix_now, Engine};
use crate::error::EngineError;

impl Engine {
    /// Check a single header against the consensus rules.
    pub fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
    ) -> Result<(), EngineError> {
        self.verify_header_inner(chain, header, &[])
    }

    /// Check a batch of headers in order.
    ///
    /// Each header may use its in-batch predecessors as parents, so a
    /// contiguous ascending segment verifies before any of it is written
    /// to the chain. Results come back in input order.
    pub fn verify_headers(
        &self,
        chain: &dyn ChainReader,
        headers: &[Header],
    ) -> Vec<Result<(), EngineError>> {
        headers
            .iter()
            .enumerate()
            .map(|(i, header)| self.verify_header_inner(chain, header, &headers[..i]))
            .collect()
    }

    fn verify_header_inner(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), EngineError> {
        let number = header.number;

        // Don't waste time on blocks from the future.
        if header.time > unix_now() {
            return Err(EngineError::FutureBlock);
        }

        let checkpoint = number % self.config.epoch == 0;

        if header.extra.len() < EXTRA_VANITY {
            return Err(EngineError::MissingVanity);
        }
        if header.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return Err(EngineError::MissingSignature);
        }
        // Only checkpoint blocks carry a signer list, and it must be a
        // whole number of addresses.
        let signer_bytes = header.extra.len() - EXTRA_VANITY - EXTRA_SEAL;
        if !checkpoint && signer_bytes != 0 {
            return Err(EngineError::ExtraSigners);
        }
        if checkpoint && signer_bytes % Address::LENGTH != 0 {
            return Err(EngineError::InvalidCheckpointSigners);
        }

        if !header.mix_digest.is_zero() {
            return Err(EngineError::InvalidMixDigest);
        }
        if header.uncle_hash != empty_uncle_hash() {
            return Err(EngineError::InvalidUncleHash);
        }
        if number > 0 && header.nonce.as_u64() < 1 {
            return Err(EngineError::InvalidNonce);
        }

        self.verify_cascading_fields(chain, header, parents)
    }

    /// Checks that depend on previous headers. The genesis block is the
    /// always-valid dead end.
    fn verify_cascading_fields(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), EngineError> {
        let number = header.number;
        if number == 0 {
            return Ok(());
        }

        let parent = match parents.last() {
            Some(parent) => parent.clone(),
            None => chain
                .header_by_hash(&header.parent_hash, number - 1)
                .ok_or(EngineError::UnknownAncestor)?,
        };
        if parent.number != number - 1 || header_hash(&parent) != header.parent_hash {
            return Err(EngineError::UnknownAncestor);
        }

        if parent.time + self.config.period > header.time {
            return Err(EngineError::InvalidTimestamp);
        }

        self.verify_seal_inner(chain, header, &parent)
    }

    /// Check that the seal signature satisfies the consensus rules.
    pub fn verify_seal(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
    ) -> Result<(), EngineError> {
        if header.number == 0 {
            return Err(EngineError::UnknownBlock);
        }
        let parent = chain
            .header_by_hash(&header.parent_hash, header.number - 1)
            .ok_or(EngineError::UnknownAncestor)?;
        self.verify_seal_inner(chain, header, &parent)
    }

    /// Recover the producer and hold it against the election: it must be
    /// the coinbase, an authorised signer of the target, inside the rank
    /// cap, and the header must carry exactly the score and rank the
    /// election predicts.
    fn verify_seal_inner(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parent: &Header,
    ) -> Result<(), EngineError> {
        let signer = self.ecrecover(header)?;
        if signer != header.coinbase {
            return Err(EngineError::Unauthorized);
        }

        let target = self.stake_target_block(chain, parent)?;
        let signers = self.signers_at(chain, &target)?;
        if !signers.contains(&signer) {
            return Err(EngineError::Unauthorized);
        }

        let (predicted, rank) = self.calc_difficulty_and_rank(&signer, chain, &target)?;
        if predicted != header.difficulty {
            return Err(EngineError::InvalidDifficulty);
        }
        if header.nonce.as_u64() != rank as u64 {
            return Err(EngineError::InvalidNonce);
        }
        Ok(())
    }
}
