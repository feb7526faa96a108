//! Traits through which the engine reaches the chain substrate.
//!
//! The header/body store, the account state database, and transaction
//! execution live outside this workspace. Every storage backend the engine
//! runs against implements these traits; the consensus crates depend only
//! on the traits.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{Address, Block, ChainConfig, Hash, Header};

/// A reward waiting out its one-epoch maturation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehindBalance {
    pub balance: BigInt,
    /// Height of the block that earned the reward.
    pub number: u64,
}

/// Read and write access to account state at one state root.
///
/// Reads take `&self`; the mutating half is only ever exercised on the
/// working copy a block is being finalised against.
pub trait StateView: Send {
    /// Current staked balance, in base units.
    fn stake_balance(&self, addr: &Address) -> BigInt;

    /// The stored Selection Point.
    fn point(&self, addr: &Address) -> BigInt;

    fn set_point(&mut self, addr: &Address, point: BigInt);

    /// Height of the address's most recent staking change.
    fn stake_updated(&self, addr: &Address) -> BigInt;

    /// Queue a reward for one-epoch maturation.
    fn add_behind_balance(&mut self, addr: &Address, number: u64, amount: BigInt);

    /// Oldest pending reward, if any.
    fn first_behind_balance(&self, addr: &Address) -> Option<BehindBalance>;

    fn remove_first_behind_balance(&mut self, addr: &Address);

    /// Credit the spendable main balance.
    fn add_balance(&mut self, addr: &Address, amount: BigInt);

    /// Commit pending writes and return the resulting state root.
    fn intermediate_root(&mut self) -> Hash;
}

/// Read access to the header/block store and historical state.
pub trait ChainReader: Send + Sync {
    fn config(&self) -> &ChainConfig;

    /// Header with the given hash, verified to sit at `number`.
    fn header_by_hash(&self, hash: &Hash, number: u64) -> Option<Header>;

    /// Canonical header at `number`.
    fn header_by_number(&self, number: u64) -> Option<Header>;

    /// Full block with the given hash at `number`.
    fn block(&self, hash: &Hash, number: u64) -> Option<Block>;

    /// A mutable working copy of the account state at the given root;
    /// `None` when unavailable. Writes never leak back into the stored
    /// state — committing is the block writer's job.
    fn state_at(&self, root: &Hash) -> Option<Box<dyn StateView>>;

    /// Whether both the block and its post-state are locally available.
    fn has_block_and_state(&self, hash: &Hash, number: u64) -> bool;
}
