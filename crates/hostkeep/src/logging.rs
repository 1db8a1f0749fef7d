//! Logging setup using `tracing` + `tracing-subscriber`
//!
//! `RUST_LOG` takes priority over the configured level.

use eyre::{WrapErr, eyre};
use tracing_subscriber::EnvFilter;

use crate::config::{AgentConfig, LogFormat};

/// Install the global subscriber
///
/// # Errors
/// Returns error if the level is not a valid filter or a subscriber is
/// already installed
pub fn init(config: &AgentConfig) -> eyre::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .wrap_err_with(|| format!("invalid log level {:?}", config.log_level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    match config.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| eyre!(e))
}
