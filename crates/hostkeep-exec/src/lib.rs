//! hostkeep-exec: external process execution
//!
//! Provides the [`CommandRunner`] capability and two implementations: a direct
//! runner that captures stdout/stderr, and a pseudo-terminal runner for tools
//! that refuse to run without a terminal attached.

pub mod command;
pub mod error;
pub mod local;
pub mod pty;
pub mod result;
pub mod traits;

pub use command::CommandSpec;
pub use error::ExecError;
pub use local::DirectRunner;
pub use pty::PtyRunner;
pub use result::CommandOutput;
pub use traits::CommandRunner;
pub use tokio_util::sync::CancellationToken;
