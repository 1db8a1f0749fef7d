//! Yum package manager (RHEL/CentOS)
//!
//! Updates are discovered in two steps: `yum check-update` tells whether
//! anything is pending, then a dry-run `yum update --assumeno` prints the
//! transaction table. Yum only prints that table with a terminal attached, so
//! the second step goes through a pseudo-terminal runner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hostkeep_exec::{CommandRunner, CommandSpec};
use tracing::{debug, instrument};

use crate::command::Invoker;
use crate::error::PackageError;
use crate::traits::{PackageManager, PackageUpdatesProvider};
use crate::types::{PackageManagerType, PackageRecord};

const YUM: &str = "/usr/bin/yum";

/// `check-update` exit code meaning updates are available
const UPDATES_AVAILABLE: i32 = 100;

/// Exit code of `update --assumeno` after printing the transaction
const ASSUMENO_ABORT: i32 = 1;

/// Parse the transaction table printed by `yum update --assumeno`
///
/// Records are taken from the install and upgrade sections. Obsoleting and
/// removal sections and `replacing` lines are ignored.
#[must_use]
pub fn parse_yum_updates(data: &[u8]) -> Vec<PackageRecord> {
    let text = String::from_utf8_lossy(data);
    let mut packages = Vec::new();
    let mut collecting = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("Transaction Summary") {
            break;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if line.ends_with(':') && fields.len() <= 3 {
            collecting = ["Installing", "Upgrading", "Updating"]
                .iter()
                .any(|section| line.starts_with(section));
            continue;
        }
        if !collecting || fields[0] == "replacing" || fields.len() < 5 {
            continue;
        }

        packages.push(PackageRecord::new(fields[0], fields[1], fields[2]));
    }

    packages
}

/// Yum update provider
pub struct YumManager {
    invoker: Invoker,
    pty: Invoker,
    security: bool,
    minimal: bool,
}

impl YumManager {
    /// Create a new yum manager
    ///
    /// # Arguments
    /// * `runner` - Runner for `check-update`
    /// * `pty_runner` - Terminal-backed runner for the dry-run update
    pub fn new(runner: Arc<dyn CommandRunner>, pty_runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            invoker: Invoker::new(runner),
            pty: Invoker::new(pty_runner),
            security: false,
            minimal: false,
        }
    }

    /// Bound each command by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.invoker.set_timeout(timeout);
        self.pty.set_timeout(timeout);
        self
    }

    /// Only report security updates
    #[must_use]
    pub fn with_security(mut self, security: bool) -> Self {
        self.security = security;
        self
    }

    /// Report the minimal update set (`update-minimal`)
    #[must_use]
    pub fn with_minimal(mut self, minimal: bool) -> Self {
        self.minimal = minimal;
        self
    }

    fn update_args(&self) -> Vec<&'static str> {
        let mut args = vec![if self.minimal { "update-minimal" } else { "update" }];
        args.extend(["--assumeno", "--cacheonly", "--color=never"]);
        if self.security {
            args.push("--security");
        }
        args
    }

    /// Whether `check-update` reports pending updates
    async fn has_updates(&self, spec: &CommandSpec) -> Result<bool, PackageError> {
        match self.invoker.exec(spec).await {
            Ok(_) => Ok(false),
            Err(e) if e.exit_code() == Some(UPDATES_AVAILABLE) => Ok(true),
            Err(e) => Err(PackageError::command(spec, e)),
        }
    }
}

impl PackageManager for YumManager {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Yum
    }

    fn is_available(&self) -> bool {
        hostkeep_fs::exists(YUM)
    }
}

#[async_trait]
impl PackageUpdatesProvider for YumManager {
    #[instrument(skip(self), fields(security = self.security, minimal = self.minimal))]
    async fn available_updates(&self) -> Result<Vec<PackageRecord>, PackageError> {
        let check = self.invoker.spec(YUM, ["check-update", "--assumeyes"]);
        if !self.has_updates(&check).await? {
            debug!("no updates available");
            return Ok(Vec::new());
        }

        let update = self.pty.spec(YUM, self.update_args());
        let stdout = match self.pty.exec(&update).await {
            Ok(output) => output.stdout,
            Err(e) if e.exit_code() == Some(ASSUMENO_ABORT) => {
                e.output().map(|o| o.stdout.clone()).unwrap_or_default()
            }
            Err(e) => return Err(PackageError::command(&update, e)),
        };

        let packages = parse_yum_updates(&stdout);
        debug!(count = packages.len(), "yum updates parsed");
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSACTION: &str = "Last metadata expiration check: 0:12:01 ago on Tue 13 Oct 2026.\r
Dependencies resolved.\r
================================================================================\r
 Package            Arch      Version                  Repository         Size\r
================================================================================\r
Installing:\r
 kernel             x86_64    4.18.0-513.el8           baseos            10 M\r
Upgrading:\r
 curl               x86_64    7.61.1-33.el8            baseos           352 k\r
 tzdata             noarch    2024a-1.el8              baseos           474 k\r
Obsoleting:\r
 grub2-tools-efi    x86_64    1:2.02-150.el8           baseos           472 k\r
     replacing  grub2-tools.x86_64 1:2.02-148.el8\r
\r
Transaction Summary\r
================================================================================\r
Install  1 Package\r
Upgrade  2 Packages\r
\r
Total download size: 11 M\r
Operation aborted.\r
";

    #[test]
    fn test_parse_transaction_table() {
        let packages = parse_yum_updates(TRANSACTION.as_bytes());

        assert_eq!(
            packages,
            vec![
                PackageRecord::new("kernel", "x86_64", "4.18.0-513.el8"),
                PackageRecord::new("curl", "x86_64", "7.61.1-33.el8"),
                PackageRecord::new("tzdata", "noarch", "2024a-1.el8"),
            ]
        );
    }

    #[test]
    fn test_parse_ignores_header_outside_sections() {
        let data = b" Package  Arch  Version  Repository  Size\nNothing to do.\n";
        assert!(parse_yum_updates(data).is_empty());
    }

    #[test]
    fn test_parse_dependency_sections() {
        let data = b"Upgrading dependencies:\n libfoo x86_64 1.1-1 appstream 20 k\nRemoving:\n bar x86_64 1.0-1 @System 10 k\n";
        let packages = parse_yum_updates(data);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "libfoo");
    }
}
