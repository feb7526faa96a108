//! Recoverable secp256k1 signatures over Keccak-256 digests.

use ember_types::{Address, Hash};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::error::CryptoError;
use crate::hash::keccak256;

/// A 65-byte recoverable signature: `r ‖ s ‖ v`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SealSignature([u8; 65]);

impl SealSignature {
    pub fn new(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    /// Build from a byte slice; `None` unless exactly 65 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 65] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

impl std::fmt::Debug for SealSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealSignature(v={})", self.0[64])
    }
}

/// Derive the address of a public key: the low 20 bytes of
/// Keccak-256 over the uncompressed point without its `0x04` tag.
pub(crate) fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&digest.as_bytes()[12..]).expect("keccak output is 32 bytes")
}

/// Recover the signing address from a digest and a 65-byte signature.
pub fn recover_signer(digest: &Hash, signature: &SealSignature) -> Result<Address, CryptoError> {
    let sig = Signature::from_slice(&signature.0[..64])
        .map_err(|_| CryptoError::InvalidSignature)?;
    let recovery_id =
        RecoveryId::from_byte(signature.0[64]).ok_or(CryptoError::InvalidSignature)?;
    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_of(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    #[test]
    fn sign_and_recover() {
        let kp = Keypair::from_seed(&[7u8; 32]).unwrap();
        let digest = keccak256(b"seal me");
        let sig = kp.sign_prehash(&digest).unwrap();
        assert_eq!(recover_signer(&digest, &sig).unwrap(), kp.address());
    }

    #[test]
    fn different_digest_recovers_different_address() {
        let kp = Keypair::from_seed(&[9u8; 32]).unwrap();
        let sig = kp.sign_prehash(&keccak256(b"one")).unwrap();
        let recovered = recover_signer(&keccak256(b"two"), &sig).unwrap();
        assert_ne!(recovered, kp.address());
    }

    #[test]
    fn garbage_signature_fails() {
        let digest = keccak256(b"data");
        let sig = SealSignature::new([0u8; 65]);
        assert!(recover_signer(&digest, &sig).is_err());
    }

    #[test]
    fn from_slice_enforces_length() {
        assert!(SealSignature::from_slice(&[0u8; 64]).is_none());
        assert!(SealSignature::from_slice(&[0u8; 65]).is_some());
    }
}
