//! The ordered set of currently staking addresses.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use ember_types::Address;

/// Ordered, duplicate-free set of staker addresses.
///
/// Insertion order is significant: it fixes candidate indices for an
/// election run. Serialises as a plain JSON array of addresses.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Address>", into = "Vec<Address>")]
pub struct StakerSet {
    list: Vec<Address>,
    index: HashSet<Address>,
}

impl StakerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address; a no-op if it is already staking.
    pub fn put(&mut self, addr: Address) {
        if self.index.insert(addr) {
            self.list.push(addr);
        }
    }

    /// Remove an address; a no-op if it is not staking.
    pub fn remove(&mut self, addr: &Address) {
        if self.index.remove(addr) {
            self.list.retain(|a| a != addr);
        }
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.index.contains(addr)
    }

    /// The members in insertion order.
    pub fn as_slice(&self) -> &[Address] {
        &self.list
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl PartialEq for StakerSet {
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl Eq for StakerSet {}

impl From<Vec<Address>> for StakerSet {
    fn from(list: Vec<Address>) -> Self {
        let mut set = Self::new();
        for addr in list {
            set.put(addr);
        }
        set
    }
}

impl From<StakerSet> for Vec<Address> {
    fn from(set: StakerSet) -> Self {
        set.list
    }
}

impl FromIterator<Address> for StakerSet {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        let mut set = Self::new();
        for addr in iter {
            set.put(addr);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn put_preserves_order_and_dedups() {
        let mut set = StakerSet::new();
        set.put(addr(3));
        set.put(addr(1));
        set.put(addr(3));
        set.put(addr(2));
        assert_eq!(set.as_slice(), &[addr(3), addr(1), addr(2)]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut set: StakerSet = [addr(1), addr(2), addr(3)].into_iter().collect();
        set.remove(&addr(2));
        assert_eq!(set.as_slice(), &[addr(1), addr(3)]);
        assert!(!set.contains(&addr(2)));
        set.remove(&addr(9));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn json_roundtrip_preserves_membership_and_order() {
        let set: StakerSet = [addr(5), addr(4), addr(6)].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        let back: StakerSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
        assert_eq!(back.as_slice(), &[addr(5), addr(4), addr(6)]);
    }
}
