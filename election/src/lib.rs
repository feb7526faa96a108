//! Deterministic stake-weighted producer election.
//!
//! Given a staker set and each staker's Selection Point, produce a total
//! ordering of producer candidates for one block height. Every node derives
//! the same seed from the block number, feeds the same candidate array, and
//! therefore computes bit-identical results — the ordering *is* the leader
//! election, no network voting involved.
//!
//! Two ranking algorithms ship side by side; the fork height selects one:
//! the range-queue variant (pre-BIP3) and the linear
//! sampling-without-replacement variant (BIP3 and later).

pub mod candidate;
pub mod range;
pub mod rng;
pub mod vote;

pub use candidate::{select_block_creator, Candidate, Candidates, MAX_MINER};
pub use rng::{derive_seed, DeterministicRng};
pub use vote::{VoteResult, VoteResults};
