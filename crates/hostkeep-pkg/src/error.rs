//! Error types for hostkeep-pkg

use hostkeep_exec::{CommandSpec, ExecError};
use thiserror::Error;

/// Errors that can occur during package operations
#[derive(Error, Debug, Clone)]
pub enum PackageError {
    /// The package manager command failed
    #[error("error running {program} with args {args:?}: {source}, stdout: {stdout:?}, stderr: {stderr:?}")]
    Command {
        /// Program that was run
        program: String,
        /// Its arguments
        args: Vec<String>,
        /// Classified execution failure
        source: ExecError,
        /// Captured stdout, if the process ran
        stdout: String,
        /// Captured stderr, if the process ran
        stderr: String,
    },

    /// Failed to parse command output
    #[error("parse error: {0}")]
    ParseError(String),
}

impl PackageError {
    /// Wrap a runner failure with the command that caused it
    pub(crate) fn command(spec: &CommandSpec, source: ExecError) -> Self {
        let (stdout, stderr) = source
            .output()
            .map(|o| (o.stdout_lossy().into_owned(), o.stderr_lossy().into_owned()))
            .unwrap_or_default();

        PackageError::Command {
            program: spec.program.clone(),
            args: spec.args.clone(),
            source,
            stdout,
            stderr,
        }
    }

    /// Underlying execution failure, if any
    #[must_use]
    pub fn exec_error(&self) -> Option<&ExecError> {
        match self {
            PackageError::Command { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check if the tool itself is missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            PackageError::Command { source, .. } => source.is_not_found(),
            PackageError::ParseError(_) => false,
        }
    }
}
