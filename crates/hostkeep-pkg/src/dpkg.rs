//! Installed packages from the dpkg database

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hostkeep_exec::CommandRunner;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::command::Invoker;
use crate::error::PackageError;
use crate::traits::{InstalledPackagesProvider, PackageManager};
use crate::types::{PackageManagerType, PackageRecord};

const DPKG_QUERY: &str = "/usr/bin/dpkg-query";

/// JSON field name to dpkg-query selector
const FIELDS: [(&str, &str); 6] = [
    ("package", "${Package}"),
    ("architecture", "${Architecture}"),
    ("version", "${Version}"),
    ("status", "${db:Status-Status}"),
    ("source_name", "${source:Package}"),
    ("source_version", "${source:Version}"),
];

/// Build a dpkg-query `-f` template emitting one JSON object per package
///
/// Pairs are sorted so the template is stable regardless of input order.
#[must_use]
pub fn format_fields_mapping(fields: &[(&str, &str)]) -> String {
    let mut pairs: Vec<String> = fields
        .iter()
        .map(|(name, selector)| format!("\"{name}\":\"{selector}\""))
        .collect();
    pairs.sort();
    format!("\\{{{}\\}}\n", pairs.join(","))
}

#[derive(Debug, Deserialize)]
struct DpkgRow {
    package: String,
    architecture: String,
    version: String,
    status: String,
    #[serde(default)]
    source_name: String,
    #[serde(default)]
    source_version: String,
}

/// Parse dpkg-query output produced by [`format_fields_mapping`]
///
/// Only rows whose status is `installed` are returned. Lines that are not
/// valid JSON are skipped.
#[must_use]
pub fn parse_installed(data: &[u8]) -> Vec<PackageRecord> {
    let text = String::from_utf8_lossy(data);
    let mut packages = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let row: DpkgRow = match serde_json::from_str(line) {
            Ok(row) => row,
            Err(e) => {
                debug!(line, error = %e, "skipping undecodable dpkg-query line");
                continue;
            }
        };
        if row.status != "installed" {
            continue;
        }
        packages.push(
            PackageRecord::new(row.package, row.architecture, row.version)
                .with_source(row.source_name, row.source_version),
        );
    }

    packages
}

/// Installed package provider backed by `dpkg-query`
pub struct DpkgQuery {
    invoker: Invoker,
}

impl DpkgQuery {
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
}

impl PackageManager for DpkgQuery {
    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Deb
    }

    fn is_available(&self) -> bool {
        hostkeep_fs::exists(DPKG_QUERY)
    }
}

#[async_trait]
impl InstalledPackagesProvider for DpkgQuery {
    #[instrument(skip(self))]
    async fn installed_packages(&self) -> Result<Vec<PackageRecord>, PackageError> {
        let template = format_fields_mapping(&FIELDS);
        let spec = self.invoker.spec(DPKG_QUERY, ["-W", "-f", template.as_str()]);
        let stdout = self.invoker.stdout(&spec).await?;

        let packages = parse_installed(&stdout);
        debug!(count = packages.len(), "dpkg packages parsed");
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fields_mapping_is_sorted() {
        let template = format_fields_mapping(&[("version", "${Version}"), ("package", "${Package}")]);
        assert_eq!(
            template,
            "\\{\"package\":\"${Package}\",\"version\":\"${Version}\"\\}\n"
        );
    }

    #[test]
    fn test_format_fields_mapping_full_template() {
        let template = format_fields_mapping(&FIELDS);
        assert!(template.starts_with("\\{\"architecture\":\"${Architecture}\""));
        assert!(template.ends_with("\"version\":\"${Version}\"\\}\n"));
    }

    #[test]
    fn test_parse_installed_filters_status() {
        let data = br#"{"architecture":"amd64","package":"bash","source_name":"bash","source_version":"5.1-2","status":"installed","version":"5.1-2+b3"}
{"architecture":"all","package":"old-conf","source_name":"old-conf","source_version":"1.0","status":"config-files","version":"1.0"}
not json at all
{"architecture":"arm64","package":"libc6","source_name":"glibc","source_version":"2.36-9","status":"installed","version":"2.36-9"}
"#;
        let packages = parse_installed(data);

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "bash");
        assert_eq!(packages[0].arch, "x86_64");
        assert_eq!(packages[0].raw_arch, "amd64");
        assert_eq!(packages[0].version, "5.1-2+b3");
        assert_eq!(packages[1].name, "libc6");
        assert_eq!(packages[1].arch, "aarch64");
        assert_eq!(packages[1].source.name, "glibc");
        assert_eq!(packages[1].source.version, "2.36-9");
    }

    #[test]
    fn test_parse_installed_empty() {
        assert!(parse_installed(b"").is_empty());
        assert!(parse_installed(b"\n\n").is_empty());
    }
}
