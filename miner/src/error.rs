use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("engine error: {0}")]
    Engine(#[from] ember_engine::EngineError),

    #[error("failed to write sealed block: {0}")]
    Write(String),

    #[error("worker channel closed")]
    ChannelClosed,
}
