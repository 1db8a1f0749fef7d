//! Error types for hostkeep-exec

use std::time::Duration;

use thiserror::Error;

use crate::result::CommandOutput;

/// Why a command did not complete successfully
///
/// Variants are classified by cause: a missing binary, a non-zero exit, and
/// cancellation are all distinct so callers can branch without matching on
/// message text.
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// The executable could not be located
    #[error("exec: {program:?}: executable file not found in $PATH")]
    NotFound {
        /// Program that was looked up
        program: String,
    },

    /// The process ran and exited with a non-zero status
    #[error("exit status {code}")]
    ExitStatus {
        /// Exit code
        code: i32,
        /// Everything the process wrote
        output: CommandOutput,
    },

    /// The process was terminated by a signal
    #[error("signal: killed")]
    Terminated {
        /// Everything the process wrote before it died
        output: CommandOutput,
    },

    /// The caller's cancellation token fired first
    #[error("context canceled")]
    Canceled {
        /// Program that was killed
        program: String,
    },

    /// The command ran past its deadline
    #[error("context deadline exceeded after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn {program:?}: {message}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying error
        message: String,
    },

    /// I/O error while collecting output
    #[error("I/O error: {0}")]
    Io(String),

    /// Pseudo-terminal allocation or control failed
    #[error("pty error: {0}")]
    Pty(String),
}

impl ExecError {
    /// Whether the binary was missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExecError::NotFound { .. })
    }

    /// Whether the caller gave up waiting (cancellation or timeout)
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ExecError::Canceled { .. } | ExecError::Timeout { .. })
    }

    /// Exit code of a process that ran to completion
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::ExitStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Output captured before the failure, when the process got that far
    #[must_use]
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            ExecError::ExitStatus { output, .. } | ExecError::Terminated { output } => {
                Some(output)
            }
            _ => None,
        }
    }
}
