//! Pseudo-terminal command execution
//!
//! Some package managers only produce their full transaction table when a
//! terminal is attached. The pty runner gives them one and returns whatever
//! was written to it as stdout.

use std::env;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use tracing::{debug, instrument, warn};

use crate::command::CommandSpec;
use crate::error::ExecError;
use crate::result::CommandOutput;
use crate::traits::CommandRunner;

/// Wide enough that table-formatting tools do not wrap rows
const DEFAULT_COLS: u16 = 512;

/// Runs a program attached to a freshly allocated pseudo-terminal
///
/// The terminal merges both output streams, so `stderr` is always empty.
#[derive(Debug, Clone)]
pub struct PtyRunner {
    size: PtySize,
}

impl PtyRunner {
    /// Create a pty runner with the default terminal size
    #[must_use]
    pub fn new() -> Self {
        Self {
            size: PtySize {
                cols: DEFAULT_COLS,
                ..PtySize::default()
            },
        }
    }

    /// Override the terminal dimensions
    #[must_use]
    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.size.rows = rows;
        self.size.cols = cols;
        self
    }

    async fn execute(&self, cmd: &CommandSpec) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();

        // Resolve up front: a pty spawn failure does not say why it failed.
        let program = lookup_program(&cmd.program).ok_or_else(|| ExecError::NotFound {
            program: cmd.program.clone(),
        })?;

        let pair = native_pty_system()
            .openpty(self.size)
            .map_err(|e| ExecError::Pty(e.to_string()))?;

        let mut builder = CommandBuilder::new(&program);
        builder.args(&cmd.args);
        if let Ok(dir) = env::current_dir() {
            builder.cwd(dir);
        }

        let mut child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| ExecError::Spawn {
                program: cmd.program.clone(),
                message: e.to_string(),
            })?;
        drop(pair.slave);

        let mut killer = child.clone_killer();
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ExecError::Pty(e.to_string()))?;
        let master = pair.master;

        let collect = tokio::task::spawn_blocking(move || {
            let stdout = read_terminal(&mut reader);
            let status = child.wait();
            drop(master);
            status.map(|status| (status, stdout))
        });

        let (status, stdout) = tokio::select! {
            res = collect => res
                .map_err(|e| ExecError::Io(e.to_string()))?
                .map_err(|e| ExecError::Io(e.to_string()))?,
            err = cmd.interrupted() => {
                if let Err(e) = killer.kill() {
                    warn!(command = %cmd, error = %e, "failed to kill pty process");
                }
                return Err(err);
            }
        };

        let output = CommandOutput {
            stdout,
            stderr: Vec::new(),
            duration: start.elapsed(),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(ExecError::ExitStatus {
                code: status.exit_code().cast_signed(),
                output,
            })
        }
    }
}

impl Default for PtyRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for PtyRunner {
    #[instrument(skip(self, cmd), fields(program = %cmd.program), level = "debug")]
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, ExecError> {
        debug!("running {:?} with args {:?}", cmd.program, cmd.args);

        let result = self.execute(cmd).await;

        let stdout = match &result {
            Ok(output) => Some(output),
            Err(e) => e.output(),
        }
        .map(|o| o.stdout_lossy().replace('\n', "\n "))
        .unwrap_or_default();
        debug!("{} {:?} output:\n{}", cmd.program, cmd.args, stdout);

        result
    }

    fn runner_type(&self) -> &'static str {
        "pty"
    }
}

/// Drain the master side until the child closes the terminal
///
/// Linux reports the closed slave as `EIO` rather than end-of-file, so any
/// non-retryable read error ends the stream.
fn read_terminal(reader: &mut dyn Read) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                debug!(error = %e, "pty stream closed");
                break;
            }
        }
    }
    out
}

/// Find `program` the way a shell would
fn lookup_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
