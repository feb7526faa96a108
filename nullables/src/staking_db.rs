//! Nullable staker store — in-memory, same JSON snapshot format as LMDB.

use std::collections::HashMap;
use std::sync::Mutex;

use ember_staking::{StakerSet, StakingDb, StakingError};
use ember_types::Hash;

/// An in-memory staker store for testing.
#[derive(Default)]
pub struct MemStakingDb {
    snapshots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemStakingDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots, for test inspection.
    pub fn len(&self) -> usize {
        self.snapshots.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StakingDb for MemStakingDb {
    fn stakers(&self, hash: &Hash) -> Result<StakerSet, StakingError> {
        let snapshots = self.snapshots.lock().expect("store lock poisoned");
        match snapshots.get(&hash.to_hex()) {
            Some(bytes) => Ok(serde_json::from_slice(bytes)?),
            None => Err(StakingError::NotFound(hash.to_hex())),
        }
    }

    fn commit(&self, hash: &Hash, stakers: &StakerSet) -> Result<(), StakingError> {
        let bytes = serde_json::to_vec(stakers)?;
        self.snapshots
            .lock()
            .expect("store lock poisoned")
            .insert(hash.to_hex(), bytes);
        Ok(())
    }

    fn clean(&self, keep: &Hash, stakers: &StakerSet) -> Result<(), StakingError> {
        let bytes = serde_json::to_vec(stakers)?;
        let mut snapshots = self.snapshots.lock().expect("store lock poisoned");
        snapshots.clear();
        snapshots.insert(keep.to_hex(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::Address;

    #[test]
    fn commit_get_clean() {
        let db = MemStakingDb::new();
        let a = Hash::new([1; 32]);
        let b = Hash::new([2; 32]);
        let set: StakerSet = [Address::new([7; 20])].into_iter().collect();

        db.commit(&a, &set).unwrap();
        db.commit(&b, &set).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.stakers(&a).unwrap(), set);

        db.clean(&b, &set).unwrap();
        assert_eq!(db.len(), 1);
        assert!(db.stakers(&a).is_err());
        assert_eq!(db.stakers(&b).unwrap(), set);
    }
}
