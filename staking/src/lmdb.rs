//! LMDB implementation of [`StakingDb`].

use std::path::Path;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use ember_types::Hash;

use crate::db::StakingDb;
use crate::error::StakingError;
use crate::stakers::StakerSet;

/// Default LMDB map size for the staker store: 256 MiB.
const DEFAULT_MAP_SIZE: usize = 256 << 20;

/// Staker snapshots in a single named LMDB database, keyed by hex block
/// hash with JSON-array values.
pub struct LmdbStakingDb {
    env: Env,
    snapshots_db: Database<Str, Bytes>,
}

impl LmdbStakingDb {
    /// Open or create the staker store at the given path.
    pub fn open(path: &Path) -> Result<Self, StakingError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, StakingError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StakingError::Store(format!("failed to create directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(1)
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let snapshots_db = env.create_database(&mut wtxn, Some("staker_sets"))?;
        wtxn.commit()?;

        Ok(Self { env, snapshots_db })
    }
}

impl StakingDb for LmdbStakingDb {
    fn stakers(&self, hash: &Hash) -> Result<StakerSet, StakingError> {
        let rtxn = self.env.read_txn()?;
        match self.snapshots_db.get(&rtxn, &hash.to_hex())? {
            Some(bytes) => Ok(serde_json::from_slice(bytes)?),
            None => Err(StakingError::NotFound(hash.to_hex())),
        }
    }

    fn commit(&self, hash: &Hash, stakers: &StakerSet) -> Result<(), StakingError> {
        let bytes = serde_json::to_vec(stakers)?;
        let mut wtxn = self.env.write_txn()?;
        self.snapshots_db.put(&mut wtxn, &hash.to_hex(), &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    fn clean(&self, keep: &Hash, stakers: &StakerSet) -> Result<(), StakingError> {
        let bytes = serde_json::to_vec(stakers)?;
        let mut wtxn = self.env.write_txn()?;
        self.snapshots_db.clear(&mut wtxn)?;
        self.snapshots_db.put(&mut wtxn, &keep.to_hex(), &bytes)?;
        wtxn.commit()?;
        tracing::debug!(keep = %keep, "pruned staker store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::Address;

    fn open_test_db() -> (tempfile::TempDir, LmdbStakingDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = LmdbStakingDb::open_with_map_size(dir.path(), 1 << 20).unwrap();
        (dir, db)
    }

    fn sample_set() -> StakerSet {
        [Address::new([2; 20]), Address::new([1; 20]), Address::new([3; 20])]
            .into_iter()
            .collect()
    }

    #[test]
    fn commit_and_reload_preserves_order() {
        let (_dir, db) = open_test_db();
        let hash = Hash::new([0xaa; 32]);
        let set = sample_set();

        db.commit(&hash, &set).unwrap();
        let loaded = db.stakers(&hash).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(loaded.as_slice(), set.as_slice());
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let (_dir, db) = open_test_db();
        let err = db.stakers(&Hash::new([0x01; 32])).unwrap_err();
        assert!(matches!(err, StakingError::NotFound(_)));
    }

    #[test]
    fn clean_keeps_only_the_target() {
        let (_dir, db) = open_test_db();
        let old = Hash::new([0x0a; 32]);
        let target = Hash::new([0x0b; 32]);
        db.commit(&old, &sample_set()).unwrap();
        db.commit(&target, &sample_set()).unwrap();

        db.clean(&target, &sample_set()).unwrap();

        assert!(db.stakers(&old).is_err());
        assert_eq!(db.stakers(&target).unwrap(), sample_set());
    }

    #[test]
    fn snapshot_value_is_json_address_array() {
        let (_dir, db) = open_test_db();
        let hash = Hash::new([0xcc; 32]);
        db.commit(&hash, &sample_set()).unwrap();

        // Re-read through serde_json to pin the on-disk format.
        let rtxn = db.env.read_txn().unwrap();
        let raw = db.snapshots_db.get(&rtxn, &hash.to_hex()).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(raw).unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 3);
    }
}
