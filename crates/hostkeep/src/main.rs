//! hostkeep agent
//!
//! Periodically collects the host's installed packages and pending updates and
//! writes them to a JSON state file.

use color_eyre::Result;

mod agent;
mod config;
mod logging;

use agent::Agent;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = Config::load_default()?;
    logging::init(&config.agent)?;

    let once = std::env::var("HOSTKEEP_ONCE").is_ok_and(|v| v == "1");
    let agent = Agent::from_config(&config)?;
    agent.run(once).await
}
