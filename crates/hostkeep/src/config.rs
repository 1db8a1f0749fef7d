//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use hostkeep_inventory::ExtractionMode;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the hostkeep agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Agent process settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Package inventory settings
    #[serde(default)]
    pub inventory: InventoryConfig,
    /// Task queue settings
    #[serde(default)]
    pub tasker: TaskerConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Agent process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Package inventory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// How installed dpkg packages are discovered
    #[serde(default)]
    pub mode: ExtractionMode,
    /// Where the inventory document is written
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Seconds between collections
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound for a single package-manager command; 0 disables it
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Filesystem root scanned by the structured extractor
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Only report security updates on yum hosts
    #[serde(default)]
    pub yum_security: bool,
    /// Report the minimal update set on yum hosts
    #[serde(default)]
    pub yum_minimal: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            state_file: default_state_file(),
            interval_secs: default_interval_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            root: default_root(),
            yum_security: false,
            yum_minimal: false,
        }
    }
}

impl InventoryConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Per-command deadline, `None` when disabled
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}

/// Task queue settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskerConfig {
    /// Release buffers retained between collections after every task
    #[serde(default)]
    pub reclaim_memory: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/var/lib/hostkeep/inventory.json")
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_command_timeout_secs() -> u64 {
    600
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("failed to parse config {}", path.display()))
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("HOSTKEEP_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![
            PathBuf::from("hostkeep.toml"),
            PathBuf::from("/etc/hostkeep/hostkeep.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("hostkeep/hostkeep.toml"));
        }

        for path in paths {
            if hostkeep_fs::exists(&path) {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.agent.log_level, "info");
        assert_eq!(config.inventory.mode, ExtractionMode::Legacy);
        assert_eq!(config.inventory.interval(), Duration::from_secs(3600));
        assert!(!config.tasker.reclaim_memory);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
[agent]
log_level = "debug"
log_format = "json"

[inventory]
mode = "verify"
state_file = "/tmp/inventory.json"
interval_secs = 60
command_timeout_secs = 30
root = "/mnt/image"
yum_security = true

[tasker]
reclaim_memory = true
"#,
        )
        .unwrap();

        assert_eq!(config.agent.log_format, LogFormat::Json);
        assert_eq!(config.inventory.mode, ExtractionMode::Verify);
        assert_eq!(config.inventory.state_file, PathBuf::from("/tmp/inventory.json"));
        assert_eq!(config.inventory.command_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.inventory.root, PathBuf::from("/mnt/image"));
        assert!(config.inventory.yum_security);
        assert!(!config.inventory.yum_minimal);
        assert!(config.tasker.reclaim_memory);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = Config::parse("[inventory]\ninterval_secs = 0\n").unwrap();
        assert_eq!(config.inventory.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_command_timeout_disables_deadline() {
        let config = Config::parse("[inventory]\ncommand_timeout_secs = 0\n").unwrap();
        assert_eq!(config.inventory.command_timeout(), None);
        assert_eq!(
            Config::default().inventory.command_timeout(),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(Config::parse("[inventory]\nmode = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostkeep.toml");
        std::fs::write(&path, "[agent]\nlog_level = \"warn\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.agent.log_level, "warn");

        let missing = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(missing.to_string().contains("failed to read config"));
    }
}
