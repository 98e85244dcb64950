//! Shared error type for configuration failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MtError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `mt-core`.
pub type MtResult<T> = Result<T, MtError>;
