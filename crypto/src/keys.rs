//! secp256k1 key pairs for block sealing.

use ember_types::{Address, Hash};
use k256::ecdsa::SigningKey;

use crate::error::CryptoError;
use crate::sign::{address_of, SealSignature};

/// A secp256k1 key pair with its derived address.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    address: Address,
}

impl Keypair {
    /// Reconstruct a key pair from 32 secret bytes.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(seed).map_err(|_| CryptoError::InvalidKey)?;
        let address = address_of(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a precomputed Keccak-256 digest, returning the 65-byte
    /// recoverable signature.
    pub fn sign_prehash(&self, digest: &Hash) -> Result<SealSignature, CryptoError> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(SealSignature::new(out))
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the secret half.
        write!(f, "Keypair({})", self.address)
    }
}
