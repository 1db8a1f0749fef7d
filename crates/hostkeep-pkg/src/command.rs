//! Shared plumbing for running package-manager commands

use std::sync::Arc;
use std::time::Duration;

use hostkeep_exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};

use crate::error::PackageError;

/// Runner plus per-invocation limits shared by every provider
#[derive(Clone)]
pub(crate) struct Invoker {
    runner: Arc<dyn CommandRunner>,
    timeout: Option<Duration>,
}

impl Invoker {
    pub(crate) fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: None,
        }
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub(crate) fn spec<I, S>(&self, program: &str, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(program).args(args);
        match self.timeout {
            Some(timeout) => spec.with_timeout(timeout),
            None => spec,
        }
    }

    /// Run and return the raw runner result for callers that branch on it
    pub(crate) async fn exec(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.runner.run(spec).await
    }

    /// Run and return stdout, wrapping any failure with its command line
    pub(crate) async fn stdout(&self, spec: &CommandSpec) -> Result<Vec<u8>, PackageError> {
        self.exec(spec)
            .await
            .map(|output| output.stdout)
            .map_err(|e| PackageError::command(spec, e))
    }
}
