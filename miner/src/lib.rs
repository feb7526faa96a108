//! The miner driver: turns chain-head and tx-pool signals into sealed
//! blocks through the consensus engine.
//!
//! Four long-lived loops cooperate over channels: the *work loop* reacts
//! to new heads and the recommit timer and issues work requests, the
//! *main loop* prepares and finalises a candidate block, the *task loop*
//! hands it to the engine's timed seal, and the *result loop* drains
//! sealed blocks into the chain. An atomic interrupt word lets a newer
//! request abandon or resubmit the one in flight.

pub mod error;
pub mod interrupt;
pub mod recommit;
pub mod worker;

pub use error::MinerError;
pub use interrupt::{CommitInterrupt, InterruptReason};
pub use recommit::RecommitCalculator;
pub use worker::{BlockWriter, TxPool, Worker, WorkerConfig, WorkerHandle};
