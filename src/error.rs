use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum CoroError {
    #[error("failed to spawn coroutine thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("coroutine killed")]
    Killed,
}

pub type CoroResult<T> = Result<T, CoroError>;

/// Failures raised by the in-memory row source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("scan error: {0}")]
    Scan(String),
    #[error("release error: {0}")]
    Release(String),
}

pub type RowResult<T> = Result<T, RowError>;
