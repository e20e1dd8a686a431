//! Error types for burstkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BurstError
pub type Result<T> = std::result::Result<T, BurstError>;

/// Unified error type for burstkv operations
#[derive(Debug, Error)]
pub enum BurstError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Compression error: {0}")]
    Compression(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Background Errors
    // -------------------------------------------------------------------------
    #[error("Background compaction failed: {0}")]
    Background(String),
}

impl BurstError {
    /// Rebuild an equivalent error from a latched one.
    ///
    /// Background failures are stored once and handed out to every caller
    /// that observes them, so the latched copy must be reproducible.
    pub(crate) fn replicate(&self) -> BurstError {
        match self {
            BurstError::Io(e) => BurstError::Io(std::io::Error::new(e.kind(), e.to_string())),
            BurstError::NotFound(m) => BurstError::NotFound(m.clone()),
            BurstError::Corruption(m) => BurstError::Corruption(m.clone()),
            BurstError::Compression(m) => BurstError::Compression(m.clone()),
            BurstError::Serialization(m) => BurstError::Serialization(m.clone()),
            BurstError::Config(m) => BurstError::Config(m.clone()),
            BurstError::InvalidArgument(m) => BurstError::InvalidArgument(m.clone()),
            BurstError::Background(m) => BurstError::Background(m.clone()),
        }
    }

    /// True for checksum or format failures
    pub fn is_corruption(&self) -> bool {
        matches!(self, BurstError::Corruption(_))
    }
}

impl From<bincode::Error> for BurstError {
    fn from(e: bincode::Error) -> Self {
        BurstError::Serialization(e.to_string())
    }
}

impl From<snap::Error> for BurstError {
    fn from(e: snap::Error) -> Self {
        BurstError::Compression(e.to_string())
    }
}
