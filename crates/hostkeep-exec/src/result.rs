//! Result types for command execution

use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// stdout bytes (the terminal stream for the pty runner)
    pub stdout: Vec<u8>,
    /// stderr bytes
    pub stderr: Vec<u8>,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandOutput {
    /// stdout decoded lossily
    #[must_use]
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// stderr decoded lossily
    #[must_use]
    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}
