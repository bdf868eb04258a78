//! Error types for eagercache.
//!
//! This module provides the single error hierarchy shared by every crate in
//! the workspace, built with `thiserror`.

use thiserror::Error;

/// Result type alias using `EagerError`.
pub type Result<T> = std::result::Result<T, EagerError>;

/// Main error type for all cache and registry operations.
#[derive(Debug, Error)]
pub enum EagerError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CONSTRUCTION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A cache was built without a loader.
    #[error("Cache requires a loader function")]
    MissingLoader,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration could not be parsed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // CACHE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The cache was closed and can no longer serve reads.
    #[error("Cache is closed")]
    CacheClosed,

    /// The loader failed to produce a value for a key.
    #[error("Loader failed for key '{key}': {reason}")]
    LoaderFailed {
        /// Key whose load failed
        key: String,
        /// Loader's description of the failure
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // REGISTRY ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A registry slot did not hold the cache being removed from it.
    #[error("Registry corrupted: slot {index} does not hold the cache being removed")]
    RegistryCorrupted {
        /// Slot that was being cleared
        index: usize,
    },

    /// The background sweeper thread could not be spawned.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EagerError {
    /// Builds a `LoaderFailed` error for `key`.
    pub fn loader(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        EagerError::LoaderFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EagerError::LoaderFailed { .. })
    }

    /// Returns true if the error signals misuse or broken bookkeeping.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EagerError::MissingLoader
                | EagerError::CacheClosed
                | EagerError::RegistryCorrupted { .. }
        )
    }
}
