//! Keccak-256 hashing for headers and signatures.

use ember_types::{Hash, Header};
use sha3::{Digest, Keccak256};

/// Compute the Keccak-256 hash of arbitrary data.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Hash::new(out)
}

/// The full header hash, seal included.
pub fn header_hash(header: &Header) -> Hash {
    keccak256(&header.encode_rlp(true))
}

/// Keccak-256 of the RLP empty list — the uncle hash every valid header
/// must carry.
pub fn empty_uncle_hash() -> Hash {
    keccak256(&[0xc0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_deterministic() {
        assert_eq!(keccak256(b"ember"), keccak256(b"ember"));
        assert_ne!(keccak256(b"ember"), keccak256(b"Ember"));
    }

    #[test]
    fn keccak_empty_input_is_known_vector() {
        // Keccak-256("") — distinct from SHA3-256("").
        assert_eq!(
            keccak256(b"").to_hex(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn empty_uncle_hash_is_known_vector() {
        assert_eq!(
            empty_uncle_hash().to_hex(),
            "1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347"
        );
    }

    #[test]
    fn header_hash_covers_seal_bytes() {
        let mut header = Header {
            extra: vec![0u8; ember_types::EXTRA_VANITY + ember_types::EXTRA_SEAL],
            ..Header::default()
        };
        let before = header_hash(&header);
        let len = header.extra.len();
        header.extra[len - 1] = 1;
        assert_ne!(header_hash(&header), before);
    }
}
