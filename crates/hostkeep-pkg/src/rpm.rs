//! Installed packages from the rpm database

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hostkeep_exec::CommandRunner;
use tracing::{debug, instrument};

use crate::command::Invoker;
use crate::error::PackageError;
use crate::traits::{InstalledPackagesProvider, PackageManager};
use crate::types::{PackageManagerType, PackageRecord};

const RPMQUERY: &str = "/usr/bin/rpmquery";
const QUERY_FORMAT: &str = "%{NAME} %{ARCH} %|EPOCH?{%{EPOCH}:}:{}|%{VERSION}-%{RELEASE}\n";

/// Parse `name arch version` lines
///
/// Lines with any other number of fields are skipped.
#[must_use]
pub fn parse_installed(data: &[u8]) -> Vec<PackageRecord> {
    let text = String::from_utf8_lossy(data);
    let mut packages = Vec::new();

    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [name, arch, version] = fields.as_slice() else {
            if !fields.is_empty() {
                debug!(line, "line does not represent an rpm");
            }
            continue;
        };
        packages.push(PackageRecord::new(*name, *arch, *version));
    }

    packages
}

/// Installed package provider backed by `rpmquery`
pub struct RpmQuery {
    invoker: Invoker,
}

impl RpmQuery {
    /// Create a provider using `runner`
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            invoker: Invoker::new(runner),
        }
    }

    /// Bound each query by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.invoker.set_timeout(timeout);
        self
    }

    /// Describe the package contained in an `.rpm` file
    ///
    /// # Errors
    /// Returns `PackageError::Command` if rpmquery fails, or
    /// `PackageError::ParseError` unless exactly one package is reported.
    #[instrument(skip(self))]
    pub async fn package_info(&self, path: &Path) -> Result<PackageRecord, PackageError> {
        let path = path.to_string_lossy().into_owned();
        let spec = self
            .invoker
            .spec(RPMQUERY, ["--queryformat", QUERY_FORMAT, "-p", path.as_str()]);
        let stdout = self.invoker.stdout(&spec).await?;

        let mut packages = parse_installed(&stdout);
        if packages.len() != 1 {
            return Err(PackageError::ParseError(format!(
                "unexpected number of parsed rpm packages {}: {:?}",
                packages.len(),
                String::from_utf8_lossy(&stdout)
            )));
        }
        Ok(packages.remove(0))
    }
}

impl PackageManager for RpmQuery {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Rpm
    }

    fn is_available(&self) -> bool {
        hostkeep_fs::exists(RPMQUERY)
    }
}

#[async_trait]
impl InstalledPackagesProvider for RpmQuery {
    #[instrument(skip(self))]
    async fn installed_packages(&self) -> Result<Vec<PackageRecord>, PackageError> {
        let spec = self
            .invoker
            .spec(RPMQUERY, ["--queryformat", QUERY_FORMAT, "-a"]);
        let stdout = self.invoker.stdout(&spec).await?;

        let packages = parse_installed(&stdout);
        debug!(count = packages.len(), "rpm packages parsed");
        Ok(packages)
    }
}
