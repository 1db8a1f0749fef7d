//! Error types for hostkeep-fs

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the path and file helpers
#[derive(Error, Debug)]
pub enum FsError {
    /// A temp file could not be opened
    #[error("open {}: {source}", path.display())]
    Open {
        /// Path that was being created
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Every candidate temp name in the directory was taken
    #[error("no unused temp file name for pattern {pattern:?} in {}", dir.display())]
    NamesExhausted {
        /// Directory that was searched
        dir: PathBuf,
        /// Name pattern
        pattern: String,
    },

    /// The temp file for an atomic write could not be created
    #[error("unable to create temp file: {0}")]
    CreateTemp(#[source] Box<FsError>),

    /// Writing or syncing the temp file failed
    #[error("unable to write temp file {}: {source}", path.display())]
    Write {
        /// Temp file path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Applying permissions to the temp file failed
    #[error("unable to set permissions on {}: {source}", path.display())]
    Permissions {
        /// Temp file path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Moving the temp file over the destination failed
    #[error("unable to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        /// Temp file path
        from: PathBuf,
        /// Destination path
        to: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The current working directory is unavailable
    #[error("unable to determine working directory: {0}")]
    WorkingDir(#[source] io::Error),
}

impl FsError {
    /// Underlying I/O error kind, if there is one
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            FsError::Open { source, .. }
            | FsError::Write { source, .. }
            | FsError::Permissions { source, .. }
            | FsError::Rename { source, .. }
            | FsError::WorkingDir(source) => Some(source.kind()),
            FsError::CreateTemp(inner) => inner.io_kind(),
            FsError::NamesExhausted { .. } => None,
        }
    }
}

/// Render an optional error for diagnostics, `"<nil>"` when absent
pub fn safe_error_string(err: Option<&dyn std::error::Error>) -> String {
    match err {
        Some(e) => e.to_string(),
        None => "<nil>".to_string(),
    }
}
