//! Scanner reading the dpkg status database directly

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::error::InventoryError;
use crate::extractor::{
    DpkgMetadata, ExtractionSource, PackageMetadata, ScanResult, ScanStatus, ScannedPackage,
    Scanner,
};

const STATUS_FILE: &str = "var/lib/dpkg/status";
const OS_RELEASE: &str = "etc/os-release";

/// One `Field: value` block of the status file
type Stanza = HashMap<String, String>;

/// Split a deb822 document into stanzas
///
/// Continuation lines (leading space or tab) are appended to the previous
/// field.
fn parse_stanzas(text: &str) -> Vec<Stanza> {
    let mut stanzas = Vec::new();
    let mut current = Stanza::new();
    let mut last_field: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            last_field = None;
            continue;
        }

        if line.starts_with([' ', '\t']) {
            if let Some(value) = last_field.as_ref().and_then(|f| current.get_mut(f)) {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((field, value)) = line.split_once(':') {
            let field = field.trim().to_string();
            current.insert(field.clone(), value.trim().to_string());
            last_field = Some(field);
        }
    }
    if !current.is_empty() {
        stanzas.push(current);
    }

    stanzas
}

/// Whether a `Status:` field describes an installed package
///
/// The field is `<want> <flag> <status>`; only the last word matters, so held
/// packages (`hold ok installed`) count too.
fn is_installed(status: &str) -> bool {
    let words: Vec<&str> = status.split_whitespace().collect();
    matches!(words.as_slice(), [_, _, "installed"])
}

/// Split `name (version)` from a `Source:` field
fn parse_source(field: &str) -> (String, Option<String>) {
    match field.split_once('(') {
        Some((name, rest)) => (
            name.trim().to_string(),
            Some(rest.trim_end_matches(')').trim().to_string()),
        ),
        None => (field.trim().to_string(), None),
    }
}

/// `ID` value from an os-release document
fn parse_os_id(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("ID="))
        .map(|id| id.trim().trim_matches('"').to_string())
        .find(|id| !id.is_empty())
}

/// Packages from a status document plus the number of malformed stanzas
fn packages_from_status(text: &str, os_id: Option<&str>) -> (Vec<ScannedPackage>, usize) {
    let mut packages = Vec::new();
    let mut malformed = 0;

    for stanza in parse_stanzas(text) {
        if !stanza.get("Status").is_some_and(|status| is_installed(status)) {
            continue;
        }
        let (Some(name), Some(version)) = (stanza.get("Package"), stanza.get("Version")) else {
            malformed += 1;
            continue;
        };

        let (source_name, source_version) = match stanza.get("Source") {
            Some(field) => parse_source(field),
            None => (name.clone(), None),
        };

        packages.push(ScannedPackage {
            name: name.clone(),
            version: version.clone(),
            metadata: PackageMetadata::Dpkg(DpkgMetadata {
                architecture: stanza.get("Architecture").cloned().unwrap_or_default(),
                source_name,
                source_version: source_version.unwrap_or_else(|| version.clone()),
                os_id: os_id.map(str::to_string),
            }),
        });
    }

    (packages, malformed)
}

async fn read(path: PathBuf) -> Result<Option<String>, InventoryError> {
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(InventoryError::Io {
            path,
            message: e.to_string(),
        }),
    }
}

/// [`Scanner`] over `<root>/var/lib/dpkg/status`
#[derive(Debug, Clone, Copy, Default)]
pub struct DpkgStatusScanner;

impl DpkgStatusScanner {
    /// Create a scanner
    pub fn new() -> Self {
        Self
    }

    async fn scan_root(&self, root: &Path) -> Result<(Vec<ScannedPackage>, usize), String> {
        let status_path = root.join(STATUS_FILE);
        let status = match read(status_path.clone()).await {
            Ok(Some(text)) => text,
            Ok(None) => return Err(format!("{} does not exist", status_path.display())),
            Err(e) => return Err(e.to_string()),
        };

        let os_id = match read(root.join(OS_RELEASE)).await {
            Ok(text) => text.as_deref().and_then(parse_os_id),
            Err(e) => {
                debug!(error = %e, "os-release unavailable");
                None
            }
        };

        Ok(packages_from_status(&status, os_id.as_deref()))
    }
}

#[async_trait]
impl Scanner for DpkgStatusScanner {
    #[instrument(skip(self))]
    async fn scan(&self, sources: &[ExtractionSource]) -> ScanResult {
        let mut packages = Vec::new();
        let mut problems = Vec::new();
        let mut failed_sources = 0;

        for source in sources {
            let ExtractionSource::Dpkg { root } = source;
            match self.scan_root(root).await {
                Ok((found, malformed)) => {
                    if malformed > 0 {
                        problems.push(format!(
                            "{source}: {malformed} entries without package or version"
                        ));
                    }
                    packages.extend(found);
                }
                Err(reason) => {
                    warn!(%source, reason = %reason, "dpkg scan failed");
                    problems.push(format!("{source}: {reason}"));
                    failed_sources += 1;
                }
            }
        }

        let status = if problems.is_empty() {
            ScanStatus::Succeeded
        } else if failed_sources == sources.len() {
            ScanStatus::Failed(problems.join("; "))
        } else {
            ScanStatus::PartiallySucceeded(problems.join("; "))
        };

        ScanResult { status, packages }
    }
}
