//! Error types for the Nebula3D scene index
//!
//! The spatial index is a performance-critical data structure layer:
//! almost every operation is total over its documented input domain and
//! invariant violations are debug assertions. The only fallible entry
//! point is scene construction with unusable world parameters.

use std::fmt;

/// Result type for Nebula3D scene operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nebula3D scene errors
#[derive(Debug, Clone)]
pub enum Error {
    /// World volume parameters are unusable (NaN, infinite or negative size)
    InvalidWorldBounds(String),

    /// Initialization failed
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidWorldBounds(msg) => write!(f, "Invalid world bounds: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
