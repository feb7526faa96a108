use thiserror::Error;

#[derive(Debug, Error)]
pub enum StakingError {
    #[error("no staker snapshot for block {0}")]
    NotFound(String),

    #[error("staking store error: {0}")]
    Store(String),

    #[error("staker snapshot serialization error: {0}")]
    Serialization(String),
}

impl From<heed::Error> for StakingError {
    fn from(e: heed::Error) -> Self {
        StakingError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for StakingError {
    fn from(e: serde_json::Error) -> Self {
        StakingError::Serialization(e.to_string())
    }
}
