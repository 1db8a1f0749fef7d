//! Error types for hostkeep-inventory

use std::path::PathBuf;

use hostkeep_pkg::PackageError;
use thiserror::Error;

/// Errors that can occur during inventory operations
#[derive(Error, Debug, Clone)]
pub enum InventoryError {
    /// The structured scan produced no usable results
    #[error("scan failed, failure reason: {0}")]
    ScanFailed(String),

    /// A scanned item carries metadata with no mapping to a package record
    #[error("unsupported inventory item {name:?}: metadata kind {kind:?}")]
    UnsupportedMetadata {
        /// Item name
        name: String,
        /// Metadata kind reported by the scanner
        kind: String,
    },

    /// Reading scanner input failed
    #[error("failed to read {path}: {message}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        message: String,
    },

    /// A package-manager parser failed
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl InventoryError {
    /// Check if the error only concerns a single scanned item
    #[must_use]
    pub fn is_per_item(&self) -> bool {
        matches!(self, InventoryError::UnsupportedMetadata { .. })
    }

    /// Check if the underlying tool is not installed
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            InventoryError::Package(e) => e.is_not_found(),
            _ => false,
        }
    }
}
