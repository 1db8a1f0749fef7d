//! Direct command execution using `tokio::process`

use std::io;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::command::CommandSpec;
use crate::error::ExecError;
use crate::result::CommandOutput;
use crate::traits::CommandRunner;

/// Runs a program directly and captures both streams in memory
#[derive(Debug, Clone)]
pub struct DirectRunner;

impl DirectRunner {
    /// Create a new direct runner
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn execute(&self, cmd: &CommandSpec) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();

        debug!(command = %cmd, "executing command");

        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&cmd.program, &e))?;

        // Dropping the wait future on interruption drops the child, which
        // kills it through kill_on_drop.
        let output = tokio::select! {
            res = child.wait_with_output() => res.map_err(|e| ExecError::Io(e.to_string()))?,
            err = cmd.interrupted() => {
                warn!(command = %cmd, error = %err, "command interrupted");
                return Err(err);
            }
        };

        let result = CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            duration: start.elapsed(),
        };

        debug!(
            command = %cmd,
            status = ?output.status.code(),
            duration = ?result.duration,
            "command completed"
        );

        if output.status.success() {
            return Ok(result);
        }

        match output.status.code() {
            Some(code) => Err(ExecError::ExitStatus {
                code,
                output: result,
            }),
            None => Err(ExecError::Terminated { output: result }),
        }
    }
}

impl Default for DirectRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for DirectRunner {
    #[instrument(skip(self, cmd), fields(program = %cmd.program), level = "debug")]
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.execute(cmd).await
    }

    fn runner_type(&self) -> &'static str {
        "direct"
    }
}

pub(crate) fn spawn_error(program: &str, err: &io::Error) -> ExecError {
    if err.kind() == io::ErrorKind::NotFound {
        ExecError::NotFound {
            program: program.to_string(),
        }
    } else {
        ExecError::Spawn {
            program: program.to_string(),
            message: err.to_string(),
        }
    }
}
