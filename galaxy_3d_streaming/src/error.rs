//! Error types for the Galaxy3D streaming core
//!
//! This module defines the error types used throughout the asset cache,
//! the pack reader and the resource manager.

use std::fmt;

/// Result type for Galaxy3D streaming operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D streaming errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (graphics device, lock poisoning, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (unknown handle, missing source asset, bad payload)
    InvalidResource(String),

    /// Initialization failed (configuration, worker threads)
    InitializationFailed(String),

    /// Pack file is malformed (bad signature, truncated, chunk size mismatch)
    InvalidFormat(String),

    /// Pack catalog was written by an incompatible core version
    VersionMismatch { expected: u32, found: u32 },

    /// File I/O failed
    Io(String),

    /// A compressed block could not be decoded
    Decompression(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidFormat(msg) => write!(f, "Invalid pack format: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "Pack version mismatch: expected {:#010x}, found {:#010x}",
                expected, found
            ),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Decompression(msg) => write!(f, "Decompression failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
