//! Crate-wide error type.

use thiserror::Error;

pub type KaleidoResult<T> = Result<T, KaleidoError>;

#[derive(Debug, Error)]
pub enum KaleidoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("report error: {0}")]
    Report(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine was driven in a way its usage contract forbids (e.g. a
    /// resolver call outside a registered scenario body). Never retried.
    #[error("usage contract violation: {0}")]
    Usage(String),
}
