//! Nullable account state — in-memory, shared between handles.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

use num_bigint::BigInt;
use num_traits::Zero;

use ember_crypto::keccak256;
use ember_types::{Address, BehindBalance, Hash, StateView};

#[derive(Default)]
struct StateInner {
    stake_balances: BTreeMap<Address, BigInt>,
    points: BTreeMap<Address, BigInt>,
    stake_updated: BTreeMap<Address, BigInt>,
    balances: BTreeMap<Address, BigInt>,
    behind: BTreeMap<Address, VecDeque<BehindBalance>>,
}

/// An in-memory account state for testing.
///
/// Clones share the same backing data, so a view handed to the engine and
/// the handle kept by the test observe each other's writes.
#[derive(Clone, Default)]
pub struct NullState {
    inner: Arc<RwLock<StateInner>>,
}

impl NullState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Test setup ──────────────────────────────────────────────────────

    pub fn set_stake_balance(&self, addr: Address, amount: BigInt) {
        self.write().stake_balances.insert(addr, amount);
    }

    pub fn set_stake_updated(&self, addr: Address, number: BigInt) {
        self.write().stake_updated.insert(addr, number);
    }

    pub fn seed_point(&self, addr: Address, point: BigInt) {
        self.write().points.insert(addr, point);
    }

    // ── Test inspection ─────────────────────────────────────────────────

    pub fn balance(&self, addr: &Address) -> BigInt {
        self.read().balances.get(addr).cloned().unwrap_or_default()
    }

    pub fn behind_balances(&self, addr: &Address) -> Vec<BehindBalance> {
        self.read()
            .behind
            .get(addr)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// An independent copy of this state, as `state_at` hands out.
    pub fn deep_clone(&self) -> Self {
        let inner = self.read();
        let copy = StateInner {
            stake_balances: inner.stake_balances.clone(),
            points: inner.points.clone(),
            stake_updated: inner.stake_updated.clone(),
            balances: inner.balances.clone(),
            behind: inner.behind.clone(),
        };
        Self {
            inner: Arc::new(RwLock::new(copy)),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StateInner> {
        self.inner.read().expect("state lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StateInner> {
        self.inner.write().expect("state lock poisoned")
    }
}

impl StateView for NullState {
    fn stake_balance(&self, addr: &Address) -> BigInt {
        self.read()
            .stake_balances
            .get(addr)
            .cloned()
            .unwrap_or_default()
    }

    fn point(&self, addr: &Address) -> BigInt {
        self.read().points.get(addr).cloned().unwrap_or_default()
    }

    fn set_point(&mut self, addr: &Address, point: BigInt) {
        self.write().points.insert(*addr, point);
    }

    fn stake_updated(&self, addr: &Address) -> BigInt {
        self.read()
            .stake_updated
            .get(addr)
            .cloned()
            .unwrap_or_default()
    }

    fn add_behind_balance(&mut self, addr: &Address, number: u64, amount: BigInt) {
        self.write()
            .behind
            .entry(*addr)
            .or_default()
            .push_back(BehindBalance {
                balance: amount,
                number,
            });
    }

    fn first_behind_balance(&self, addr: &Address) -> Option<BehindBalance> {
        self.read().behind.get(addr)?.front().cloned()
    }

    fn remove_first_behind_balance(&mut self, addr: &Address) {
        if let Some(queue) = self.write().behind.get_mut(addr) {
            queue.pop_front();
        }
    }

    fn add_balance(&mut self, addr: &Address, amount: BigInt) {
        let mut inner = self.write();
        let entry = inner.balances.entry(*addr).or_insert_with(BigInt::zero);
        *entry += amount;
    }

    fn intermediate_root(&mut self) -> Hash {
        // Deterministic digest over the full sorted contents.
        let inner = self.read();
        let mut bytes = Vec::new();
        for (addr, amount) in &inner.stake_balances {
            bytes.extend_from_slice(addr.as_bytes());
            bytes.extend_from_slice(&amount.to_signed_bytes_be());
        }
        for (addr, point) in &inner.points {
            bytes.extend_from_slice(addr.as_bytes());
            bytes.extend_from_slice(&point.to_signed_bytes_be());
        }
        for (addr, amount) in &inner.balances {
            bytes.extend_from_slice(addr.as_bytes());
            bytes.extend_from_slice(&amount.to_signed_bytes_be());
        }
        for (addr, queue) in &inner.behind {
            bytes.extend_from_slice(addr.as_bytes());
            for entry in queue {
                bytes.extend_from_slice(&entry.number.to_be_bytes());
                bytes.extend_from_slice(&entry.balance.to_signed_bytes_be());
            }
        }
        keccak256(&bytes)
    }
}
