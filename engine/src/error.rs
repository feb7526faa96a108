//! Consensus error kinds.
//!
//! The set is closed and propagates unchanged through the call stack, so
//! embedding code can match on kinds without depending on engine internals.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Reference to a block the node does not track.
    #[error("unknown block")]
    UnknownBlock,

    /// A required parent or target is missing; the caller may retry later.
    #[error("unknown ancestor")]
    UnknownAncestor,

    #[error("extra-data 32 byte vanity prefix missing")]
    MissingVanity,

    #[error("extra-data 65 byte signature suffix missing")]
    MissingSignature,

    /// A non-checkpoint block carries a signer list.
    #[error("non-checkpoint block contains extra signer list")]
    ExtraSigners,

    /// A checkpoint signer list is not a whole number of addresses.
    #[error("invalid signer list on checkpoint block")]
    InvalidCheckpointSigners,

    #[error("non-zero mix digest")]
    InvalidMixDigest,

    #[error("non empty uncle hash")]
    InvalidUncleHash,

    #[error("invalid nonce")]
    InvalidNonce,

    #[error("invalid difficulty")]
    InvalidDifficulty,

    /// The timestamp is below the parent's plus the block period.
    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("block in the future")]
    FutureBlock,

    /// Signer absent from the elected set, or ranked over the cap.
    #[error("unauthorized signer")]
    Unauthorized,

    /// Account state unavailable for a required root.
    #[error("state missing")]
    MissingState,

    /// Staker-set reconstruction failed.
    #[error("staking list unavailable: {0}")]
    StakingList(String),

    #[error("failed to clean staking store")]
    CleanStakingDb,

    #[error("failed to apply BIP1 fork support")]
    Bip1,
}
