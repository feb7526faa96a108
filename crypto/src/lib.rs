//! Hashing and signing primitives for the EMBER consensus engine.
//!
//! Keccak-256 digests, recoverable secp256k1 signatures, and the
//! address-from-public-key derivation. Everything here is deterministic;
//! key generation from entropy is the embedding node's concern.

pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use error::CryptoError;
pub use hash::{empty_uncle_hash, header_hash, keccak256};
pub use keys::Keypair;
pub use sign::{recover_signer, SealSignature};
