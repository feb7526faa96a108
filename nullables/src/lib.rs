//! Nullable chain substrate for deterministic engine tests.
//!
//! The engine reaches its surroundings (header store, account state,
//! staker store) only through traits. The implementations here are fully
//! in-memory and programmable: seed them with exactly the chain shape a
//! test needs, run the engine against them, inspect what changed. No
//! filesystem, no network, no wall-clock surprises.

pub mod chain;
pub mod staking_db;
pub mod state;

pub use chain::{genesis_with_signers, NullChain};
pub use staking_db::MemStakingDb;
pub use state::NullState;
