//! Storage seam for per-block staker snapshots.

use ember_types::Hash;

use crate::error::StakingError;
use crate::stakers::StakerSet;

/// Persistent map `block hash → staker set`.
///
/// Every backend stores snapshots as JSON arrays of addresses keyed by the
/// hex block hash, so snapshots written by one backend are readable by
/// another. Implementations must be safe to share across the engine's
/// verification and sealing paths.
pub trait StakingDb: Send + Sync {
    /// The snapshot committed for `hash`, or `NotFound`.
    fn stakers(&self, hash: &Hash) -> Result<StakerSet, StakingError>;

    /// Persist the snapshot for `hash`, replacing any previous one.
    fn commit(&self, hash: &Hash, stakers: &StakerSet) -> Result<(), StakingError>;

    /// Drop every snapshot except the one re-committed for `keep`.
    ///
    /// Runs on the engine's clean cycle to bound disk usage; the kept
    /// snapshot is the current election target, from which any later set
    /// can be replayed.
    fn clean(&self, keep: &Hash, stakers: &StakerSet) -> Result<(), StakingError>;
}
