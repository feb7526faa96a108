//! Nullable chain substrate — headers, blocks, and states in memory.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ember_crypto::{empty_uncle_hash, header_hash};
use ember_types::{
    Address, Block, ChainConfig, ChainReader, Hash, Header, StateView, EXTRA_SEAL, EXTRA_VANITY,
};

use crate::state::NullState;

#[derive(Default)]
struct ChainInner {
    headers: HashMap<Hash, Header>,
    canonical: HashMap<u64, Hash>,
    blocks: HashMap<Hash, Block>,
    /// Account state keyed by state root.
    states: HashMap<Hash, NullState>,
}

/// An in-memory chain for testing.
///
/// Thread-safe; blocks are registered with their post-state so the engine
/// can walk parents, fetch bodies, and open historical state exactly as it
/// would against the real substrate.
pub struct NullChain {
    config: ChainConfig,
    inner: Arc<RwLock<ChainInner>>,
}

impl NullChain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            inner: Arc::default(),
        }
    }

    /// Register a block as canonical at its height, along with the account
    /// state at its state root.
    pub fn insert_block(&self, block: Block, state: NullState) {
        let header = block.header().clone();
        let hash = header_hash(&header);
        let mut inner = self.inner.write().expect("chain lock poisoned");
        inner.canonical.insert(header.number, hash);
        inner.states.insert(header.state_root, state);
        inner.headers.insert(hash, header);
        inner.blocks.insert(hash, block);
    }

    /// The state registered under a root, for test inspection.
    pub fn state(&self, root: &Hash) -> Option<NullState> {
        self.inner
            .read()
            .expect("chain lock poisoned")
            .states
            .get(root)
            .cloned()
    }

    /// The canonical header at a height, for test inspection.
    pub fn canonical_header(&self, number: u64) -> Option<Header> {
        self.header_by_number(number)
    }
}

impl ChainReader for NullChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn header_by_hash(&self, hash: &Hash, number: u64) -> Option<Header> {
        let inner = self.inner.read().expect("chain lock poisoned");
        let header = inner.headers.get(hash)?;
        (header.number == number).then(|| header.clone())
    }

    fn header_by_number(&self, number: u64) -> Option<Header> {
        let inner = self.inner.read().expect("chain lock poisoned");
        let hash = inner.canonical.get(&number)?;
        inner.headers.get(hash).cloned()
    }

    fn block(&self, hash: &Hash, number: u64) -> Option<Block> {
        let inner = self.inner.read().expect("chain lock poisoned");
        let block = inner.blocks.get(hash)?;
        (block.number() == number).then(|| block.clone())
    }

    fn state_at(&self, root: &Hash) -> Option<Box<dyn StateView>> {
        let inner = self.inner.read().expect("chain lock poisoned");
        let state = inner.states.get(root)?;
        Some(Box::new(state.deep_clone()))
    }

    fn has_block_and_state(&self, hash: &Hash, number: u64) -> bool {
        let inner = self.inner.read().expect("chain lock poisoned");
        match inner.blocks.get(hash) {
            Some(block) => {
                block.number() == number && inner.states.contains_key(&block.header().state_root)
            }
            None => false,
        }
    }
}

/// Build a genesis header whose extra-data authorises the given signers.
pub fn genesis_with_signers(signers: &[Address], time: u64, state_root: Hash) -> Header {
    let mut extra = vec![0u8; EXTRA_VANITY];
    for signer in signers {
        extra.extend_from_slice(signer.as_bytes());
    }
    extra.extend_from_slice(&[0u8; EXTRA_SEAL]);

    Header {
        uncle_hash: empty_uncle_hash(),
        state_root,
        time,
        extra,
        ..Header::default()
    }
}
