//! Engine error taxonomy

use crate::ledger::TransactionId;
use thiserror::Error;

/// Errors surfaced by the risk engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Weight store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a [`WeightStore`](crate::persistence::WeightStore)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt weight snapshot: {0}")]
    CorruptSnapshot(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
