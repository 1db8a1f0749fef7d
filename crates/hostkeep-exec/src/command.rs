//! Command invocation description

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ExecError;

/// One external command to run
///
/// Consumed by a [`crate::CommandRunner`]. The optional cancellation token and
/// timeout bound how long the runner waits before killing the process.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, not including the program
    pub args: Vec<String>,
    /// Deadline for the whole invocation
    pub timeout: Option<Duration>,
    /// Caller-driven cancellation
    pub cancel: Option<CancellationToken>,
}

impl CommandSpec {
    /// Create a spec with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bound execution time
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolves once the invocation should be abandoned
    ///
    /// Never resolves when neither a timeout nor a token is set.
    pub(crate) async fn interrupted(&self) -> ExecError {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            () = cancelled => ExecError::Canceled { program: self.program.clone() },
            () = expired => ExecError::Timeout {
                timeout: self.timeout.unwrap_or_default(),
            },
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
