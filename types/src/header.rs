//! Block header consumed and produced by the consensus engine.

use num_bigint::BigInt;
use num_traits::Zero;
use rlp::RlpStream;
use serde::{Deserialize, Serialize};

use crate::{Address, Hash};

/// Fixed number of extra-data prefix bytes reserved for producer vanity.
pub const EXTRA_VANITY: usize = 32;
/// Fixed number of extra-data suffix bytes reserved for the producer seal.
pub const EXTRA_SEAL: usize = 65;

/// 8-byte block nonce; carries the producer's elected rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNonce([u8; 8]);

impl BlockNonce {
    pub const ZERO: Self = Self([0u8; 8]);

    pub fn encode(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

/// A block header.
///
/// `difficulty` holds the producer's election score, `nonce` its elected
/// rank. `extra` is `vanity[32] ‖ (checkpoint signer list) ‖ seal[65]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub parent_hash: Hash,
    pub uncle_hash: Hash,
    pub coinbase: Address,
    pub state_root: Hash,
    pub difficulty: BigInt,
    pub number: u64,
    /// Unix seconds.
    pub time: u64,
    pub extra: Vec<u8>,
    pub mix_digest: Hash,
    pub nonce: BlockNonce,
}

impl Header {
    /// RLP encoding of every header field, in canonical order.
    ///
    /// With `with_seal == false` the trailing [`EXTRA_SEAL`] bytes of
    /// `extra` are excluded; hashing that form yields the sig-hash the
    /// producer signs. Callers must have validated that `extra` is at
    /// least [`EXTRA_SEAL`] bytes long before asking for the sealless form.
    pub fn encode_rlp(&self, with_seal: bool) -> Vec<u8> {
        let extra: &[u8] = if with_seal {
            &self.extra
        } else {
            &self.extra[..self.extra.len().saturating_sub(EXTRA_SEAL)]
        };

        let mut s = RlpStream::new_list(10);
        s.append(&&self.parent_hash.as_bytes()[..]);
        s.append(&&self.uncle_hash.as_bytes()[..]);
        s.append(&&self.coinbase.as_bytes()[..]);
        s.append(&&self.state_root.as_bytes()[..]);
        append_bigint(&mut s, &self.difficulty);
        s.append(&self.number);
        s.append(&self.time);
        s.append(&extra);
        s.append(&&self.mix_digest.as_bytes()[..]);
        s.append(&&self.nonce.as_bytes()[..]);
        s.out().to_vec()
    }

    /// The signer list carried between vanity and seal, if any.
    ///
    /// Returns `None` when `extra` is too short to hold both fixed
    /// sections; an empty slice is a valid (non-checkpoint) result.
    pub fn signer_section(&self) -> Option<&[u8]> {
        if self.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return None;
        }
        Some(&self.extra[EXTRA_VANITY..self.extra.len() - EXTRA_SEAL])
    }

    /// The trailing 65 seal bytes, if present.
    pub fn seal_bytes(&self) -> Option<&[u8]> {
        if self.extra.len() < EXTRA_SEAL {
            return None;
        }
        Some(&self.extra[self.extra.len() - EXTRA_SEAL..])
    }
}

/// RLP-append a non-negative big integer as its minimal big-endian bytes
/// (the empty string for zero).
fn append_bigint(s: &mut RlpStream, value: &BigInt) {
    if value.is_zero() {
        s.append_empty_data();
        return;
    }
    let (_, bytes) = value.to_bytes_be();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    s.append(&&bytes[first_nonzero..]);
}
