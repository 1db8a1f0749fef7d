//! Command runner trait

use async_trait::async_trait;

use crate::command::CommandSpec;
use crate::error::ExecError;
use crate::result::CommandOutput;

/// Runs external processes
///
/// Implementations hold no per-invocation state, so one instance can be
/// shared behind an `Arc` and called concurrently. Package-manager parsers
/// depend on this trait only, which lets tests substitute a scripted runner.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, cancellation, or timeout
    ///
    /// # Errors
    /// See [`ExecError`] for the classification of failures. A non-zero exit
    /// still carries the captured output.
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, ExecError>;

    /// Short name for diagnostics
    fn runner_type(&self) -> &'static str;
}
