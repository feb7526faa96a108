use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid private key bytes")]
    InvalidKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("signing failed: {0}")]
    Signing(String),
}
