//! Seed derivation and the cross-node deterministic random stream.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use ember_types::ChainConfig;

/// Derive the election seed for a block number.
///
/// The number is hashed with SHA-256 and the digest's low 64 bits (of its
/// big-endian integer value) are reinterpreted as a signed seed. Before
/// BIP2 only the low byte of the number is hashed — kept solely for
/// genesis-era compatibility; after BIP2 the minimal big-endian encoding
/// of the full number is hashed (the empty string for zero).
pub fn derive_seed(config: &ChainConfig, number: u64) -> i64 {
    let be = number.to_be_bytes();
    let bytes: &[u8] = if config.is_bip2(number) {
        let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        &be[first..]
    } else {
        &be[7..]
    };

    let digest = Sha256::digest(bytes);
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[24..]);
    i64::from_be_bytes(tail)
}

/// The deterministic random stream all nodes replay during one election.
///
/// ChaCha8 keyed by the 64-bit seed, drawn through 63-bit rejection
/// sampling so `int_below` is unbiased and the stream is identical on
/// every platform.
pub struct DeterministicRng {
    inner: ChaCha8Rng,
}

impl DeterministicRng {
    pub fn from_seed(seed: i64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed as u64),
        }
    }

    fn next_int63(&mut self) -> u64 {
        self.inner.next_u64() >> 1
    }

    /// A uniform draw in `[0, n)`; returns 0 when `n` is 0.
    pub fn int_below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        if n & (n - 1) == 0 {
            return self.next_int63() & (n - 1);
        }
        let max = ((1u64 << 63) - 1) - ((1u64 << 63) % n);
        let mut v = self.next_int63();
        while v > max {
            v = self.next_int63();
        }
        v % n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = DeterministicRng::from_seed(-42);
        let mut b = DeterministicRng::from_seed(-42);
        for _ in 0..64 {
            assert_eq!(a.int_below(1000), b.int_below(1000));
        }
    }

    #[test]
    fn draws_stay_in_range() {
        let mut rng = DeterministicRng::from_seed(7);
        for n in [1u64, 2, 3, 7, 75, 1 << 32] {
            for _ in 0..32 {
                assert!(rng.int_below(n) < n);
            }
        }
        assert_eq!(rng.int_below(0), 0);
    }

    #[test]
    fn seed_depends_on_full_number_after_bip2() {
        let cfg = ChainConfig::dev();
        // 0x0100 and 0x0200 share a zero low byte but differ above it.
        assert_ne!(derive_seed(&cfg, 0x0100), derive_seed(&cfg, 0x0200));
    }

    #[test]
    fn seed_uses_low_byte_before_bip2() {
        let cfg = ChainConfig::default();
        assert!(!cfg.is_bip2(0x0100));
        assert_eq!(derive_seed(&cfg, 0x0100), derive_seed(&cfg, 0x0200));
        assert_ne!(derive_seed(&cfg, 0x01), derive_seed(&cfg, 0x02));
    }

    #[test]
    fn seed_is_stable() {
        let cfg = ChainConfig::dev();
        assert_eq!(derive_seed(&cfg, 1_000_000), derive_seed(&cfg, 1_000_000));
    }
}
