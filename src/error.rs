//! Error taxonomy shared by every core operation.

use thiserror::Error;

use crate::store::StoreError;

pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Error)]
pub enum GameError {
    /// Malformed or out-of-range input: unknown building type, terrain
    /// that can never be bought, coordinate outside the map.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A concurrent mutation won the race; retry with fresh data.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A business-rule gate failed: insufficient funds, level too low,
    /// license cap reached, imprisoned.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Storage or batch-commit failure. The recompute pass is safe to
    /// re-invoke after one of these; nothing else is retried by the core.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(msg) => GameError::NotFound(msg),
            StoreError::Conflict(msg) => GameError::Conflict(msg),
            StoreError::Backend(msg) => GameError::Internal(msg),
        }
    }
}
