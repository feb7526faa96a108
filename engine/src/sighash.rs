//! The digest block producers sign.

use ember_crypto::keccak256;
use ember_types::{Hash, Header};

/// Keccak-256 over the RLP of every header field with the trailing 65
/// seal bytes excluded from `extra`.
///
/// Using one fixed form (signature always absent) prevents the same header
/// from hashing two ways depending on whether it is sealed yet.
pub fn seal_hash(header: &Header) -> Hash {
    keccak256(&header.encode_rlp(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::{EXTRA_SEAL, EXTRA_VANITY};

    #[test]
    fn seal_bytes_do_not_affect_the_sighash() {
        let mut header = Header {
            number: 5,
            extra: vec![0u8; EXTRA_VANITY + EXTRA_SEAL],
            ..Header::default()
        };
        let digest = seal_hash(&header);
        let len = header.extra.len();
        header.extra[len - EXTRA_SEAL..].fill(0x77);
        assert_eq!(seal_hash(&header), digest);
    }

    #[test]
    fn every_other_byte_does() {
        let mut header = Header {
            number: 5,
            extra: vec![0u8; EXTRA_VANITY + EXTRA_SEAL],
            ..Header::default()
        };
        let digest = seal_hash(&header);

        header.extra[0] = 1;
        let vanity_changed = seal_hash(&header);
        assert_ne!(vanity_changed, digest);

        header.time = 99;
        assert_ne!(seal_hash(&header), vanity_changed);
    }
}
