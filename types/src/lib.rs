//! Fundamental types for the EMBER protocol.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: addresses, hashes, headers, transactions, chain configuration,
//! and the traits through which the consensus engine reaches the surrounding
//! chain substrate.

pub mod address;
pub mod block;
pub mod chain;
pub mod config;
pub mod hash;
pub mod header;
pub mod transaction;

pub use address::Address;
pub use block::Block;
pub use chain::{BehindBalance, ChainReader, StateView};
pub use config::{ChainConfig, EngineConfig};
pub use hash::Hash;
pub use header::{BlockNonce, Header, EXTRA_SEAL, EXTRA_VANITY};
pub use transaction::{JobWallet, Transaction};
