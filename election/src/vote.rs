//! Election results.

use std::collections::HashMap;

use num_bigint::BigInt;

use ember_types::Address;

/// One elected address: its score (the header difficulty it must carry)
/// and its rank (the header nonce, and the seal-delay slot).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteResult {
    pub score: BigInt,
    pub rank: u32,
}

/// Per-address election results; at most one entry per address.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoteResults(HashMap<Address, VoteResult>);

impl VoteResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, address: Address, result: VoteResult) {
        self.0.insert(address, result);
    }

    pub fn get(&self, address: &Address) -> Option<&VoteResult> {
        self.0.get(address)
    }

    pub fn rank_of(&self, address: &Address) -> Option<u32> {
        self.0.get(address).map(|r| r.rank)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &VoteResult)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
