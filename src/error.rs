//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Cloneable so that a single computation failure can be handed to every
/// caller waiting on the same flight.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Rejected construction parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The key derivation function failed for the given arguments
    #[error("Key derivation failed: {0}")]
    KeyDerivation(Arc<anyhow::Error>),

    /// The wrapped computation failed or panicked
    #[error("Computation failed: {0}")]
    Computation(Arc<anyhow::Error>),

    /// The flight ended without publishing an outcome
    #[error("Computation abandoned: {0}")]
    Abandoned(String),
}

impl CacheError {
    /// Wraps a key derivation failure.
    pub fn key_derivation(err: impl Into<anyhow::Error>) -> Self {
        CacheError::KeyDerivation(Arc::new(err.into()))
    }

    /// Wraps a computation failure.
    pub fn computation(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Computation(Arc::new(err.into()))
    }

    /// Returns the underlying failure of a computation or key derivation error.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            CacheError::KeyDerivation(err) | CacheError::Computation(err) => Some(err),
            _ => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
