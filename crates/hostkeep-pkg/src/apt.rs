//! APT package manager (Debian/Ubuntu)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hostkeep_exec::CommandRunner;
use tracing::{debug, instrument};

use crate::command::Invoker;
use crate::error::PackageError;
use crate::traits::{PackageManager, PackageUpdatesProvider};
use crate::types::{PackageManagerType, PackageRecord};

const APT_GET: &str = "/usr/bin/apt-get";
const APT: &str = "/usr/bin/apt";

/// Parse `apt list --upgradable` output
///
/// Lines look like
/// `vim/stable-security 2:9.0.1378-2+deb12u1 amd64 [upgradable from: 2:9.0.1378-2]`;
/// the record carries the candidate version.
#[must_use]
pub fn parse_upgradable(output: &str) -> Vec<PackageRecord> {
    let mut packages = Vec::new();

    for line in output.lines() {
        if line.is_empty() || line.starts_with("Listing") || line.starts_with("WARNING") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            debug!(line, "skipping unrecognized apt line");
            continue;
        }

        let name = parts[0].split_once('/').map_or(parts[0], |(name, _suite)| name);
        packages.push(PackageRecord::new(name, parts[2], parts[1]));
    }

    packages
}

/// APT update provider
pub struct AptManager {
    invoker: Invoker,
}

impl AptManager {
    /// Create a new APT manager
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            invoker: Invoker::new(runner),
        }
    }

    /// Bound each command by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.invoker.set_timeout(timeout);
        self
    }
}

impl PackageManager for AptManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Apt
    }

    fn is_available(&self) -> bool {
        hostkeep_fs::exists(APT)
    }
}

#[async_trait]
impl PackageUpdatesProvider for AptManager {
    #[instrument(skip(self))]
    async fn available_updates(&self) -> Result<Vec<PackageRecord>, PackageError> {
        debug!("refreshing package lists");
        let update = self.invoker.spec(APT_GET, ["update", "-qq"]);
        self.invoker.stdout(&update).await?;

        let list = self.invoker.spec(APT, ["list", "--upgradable"]);
        let stdout = self.invoker.stdout(&list).await?;

        let packages = parse_upgradable(&String::from_utf8_lossy(&stdout));
        debug!(count = packages.len(), "apt updates parsed");
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upgradable() {
        let output = r"Listing...
WARNING: apt does not have a stable CLI interface. Use with caution in scripts.
vim/stable-security 2:9.0.1378-2+deb12u1 amd64 [upgradable from: 2:9.0.1378-2]
tzdata/stable-updates 2024a-0+deb12u1 all [upgradable from: 2023c-5+deb12u1]
";
        let packages = parse_upgradable(output);

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "vim");
        assert_eq!(packages[0].version, "2:9.0.1378-2+deb12u1");
        assert_eq!(packages[0].arch, "x86_64");
        assert_eq!(packages[1].name, "tzdata");
        assert_eq!(packages[1].arch, "all");
    }

    #[test]
    fn test_parse_upgradable_empty() {
        assert!(parse_upgradable("Listing...\n").is_empty());
        assert!(parse_upgradable("").is_empty());
    }

    #[test]
    fn test_parse_upgradable_skips_short_lines() {
        let packages = parse_upgradable("garbage\nfoo/now 1.0 arm64\n");
        assert_eq!(packages, vec![PackageRecord::new("foo", "arm64", "1.0")]);
    }
}
