//! Structured extraction capability
//!
//! A [`Scanner`] walks extraction sources and reports what it found together
//! with an overall status. [`StructuredExtractor`] turns that report into
//! [`InventoryItem`]s: a failed scan is an error, unmappable items are
//! skipped one by one, and a partial scan keeps its items while recording the
//! failure reason.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use hostkeep_pkg::{PackageRecord, SourcePackage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::InventoryError;

/// What to scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionSource {
    /// A dpkg database under `root`
    Dpkg {
        /// Filesystem root containing `var/lib/dpkg/status`
        root: PathBuf,
    },
}

impl ExtractionSource {
    /// Dpkg database of the running system
    #[must_use]
    pub fn dpkg() -> Self {
        ExtractionSource::Dpkg {
            root: PathBuf::from("/"),
        }
    }
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionSource::Dpkg { root } => write!(f, "dpkg:{}", root.display()),
        }
    }
}

/// Overall outcome of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every source was scanned
    Succeeded,
    /// Some results are usable; the reason describes what was lost
    PartiallySucceeded(String),
    /// Nothing usable was produced
    Failed(String),
}

/// Fields the dpkg database records for one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DpkgMetadata {
    /// Architecture as written in the database
    pub architecture: String,
    /// Source package name
    pub source_name: String,
    /// Source package version
    pub source_version: String,
    /// `ID` from os-release, if known
    pub os_id: Option<String>,
}

/// Kind-specific metadata attached to a scanned package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageMetadata {
    /// Package from a dpkg database
    Dpkg(DpkgMetadata),
    /// A kind this crate cannot map to a package record
    Unsupported {
        /// Kind name reported by the scanner
        kind: String,
    },
}

/// One package found by a scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPackage {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Kind-specific details
    pub metadata: PackageMetadata,
}

/// Raw scanner output
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Overall outcome
    pub status: ScanStatus,
    /// Everything found, including on partial success
    pub packages: Vec<ScannedPackage>,
}

/// Walks extraction sources and reports packages
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan every source; failures are reported through the status
    async fn scan(&self, sources: &[ExtractionSource]) -> ScanResult;
}

/// A package in the shape produced by structured extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Architecture as reported by the scanner
    pub raw_arch: String,
    /// Originating source package
    pub source: SourcePackage,
    /// Package URL
    pub purl: String,
}

impl InventoryItem {
    /// Convert to a record with a normalized architecture
    #[must_use]
    pub fn to_record(&self) -> PackageRecord {
        PackageRecord::new(&self.name, &self.raw_arch, &self.version)
            .with_source(&self.source.name, &self.source.version)
    }
}

/// Package URL for a dpkg package
///
/// Falls back to the `linux` namespace when the distribution is unknown.
#[must_use]
pub fn dpkg_purl(name: &str, version: &str, arch: &str, os_id: Option<&str>) -> String {
    let namespace = os_id.filter(|id| !id.is_empty()).unwrap_or("linux");
    let mut purl = format!("pkg:deb/{namespace}/{name}@{version}");
    if !arch.is_empty() {
        purl.push_str("?arch=");
        purl.push_str(arch);
    }
    purl
}

impl TryFrom<ScannedPackage> for InventoryItem {
    type Error = InventoryError;

    fn try_from(package: ScannedPackage) -> Result<Self, Self::Error> {
        match package.metadata {
            PackageMetadata::Dpkg(meta) => Ok(InventoryItem {
                purl: dpkg_purl(
                    &package.name,
                    &package.version,
                    &meta.architecture,
                    meta.os_id.as_deref(),
                ),
                name: package.name,
                version: package.version,
                raw_arch: meta.architecture,
                source: SourcePackage {
                    name: meta.source_name,
                    version: meta.source_version,
                },
            }),
            PackageMetadata::Unsupported { kind } => Err(InventoryError::UnsupportedMetadata {
                name: package.name,
                kind,
            }),
        }
    }
}

/// Successful or partially successful extraction
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Mapped items
    pub items: Vec<InventoryItem>,
    /// Number of scanned packages that could not be mapped
    pub skipped: usize,
    /// Set when the scan only partially succeeded
    pub partial_failure: Option<String>,
}

impl Extraction {
    /// Items as package records
    #[must_use]
    pub fn records(&self) -> Vec<PackageRecord> {
        self.items.iter().map(InventoryItem::to_record).collect()
    }

    /// Whether the scan covered every source
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.partial_failure.is_none()
    }
}

/// Pluggable structured inventory extraction
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract inventory from `sources`
    ///
    /// # Errors
    /// Returns `InventoryError::ScanFailed` when nothing usable was produced.
    /// Partial results are returned as `Ok` with `partial_failure` set.
    async fn extract_inventory(
        &self,
        sources: &[ExtractionSource],
    ) -> Result<Extraction, InventoryError>;
}

/// Extractor backed by a [`Scanner`]
pub struct StructuredExtractor<S> {
    scanner: S,
}

impl<S: Scanner> StructuredExtractor<S> {
    /// Wrap `scanner`
    pub fn new(scanner: S) -> Self {
        Self { scanner }
    }
}

/// Map a raw scan result into an extraction
///
/// # Errors
/// Returns `InventoryError::ScanFailed` if the scan failed outright.
pub fn deconstruct_scan_result(result: ScanResult) -> Result<Extraction, InventoryError> {
    let partial_failure = match result.status {
        ScanStatus::Failed(reason) => return Err(InventoryError::ScanFailed(reason)),
        ScanStatus::PartiallySucceeded(reason) => Some(reason),
        ScanStatus::Succeeded => None,
    };

    let mut extraction = Extraction {
        items: Vec::with_capacity(result.packages.len()),
        skipped: 0,
        partial_failure,
    };
    for package in result.packages {
        match InventoryItem::try_from(package) {
            Ok(item) => extraction.items.push(item),
            Err(e) => {
                debug!(error = %e, "skipping inventory item");
                extraction.skipped += 1;
            }
        }
    }

    Ok(extraction)
}

#[async_trait]
impl<S: Scanner> Extractor for StructuredExtractor<S> {
    #[instrument(skip(self))]
    async fn extract_inventory(
        &self,
        sources: &[ExtractionSource],
    ) -> Result<Extraction, InventoryError> {
        let extraction = deconstruct_scan_result(self.scanner.scan(sources).await)?;

        if extraction.skipped > 0 {
            warn!(skipped = extraction.skipped, "some scanned items could not be mapped");
        }
        debug!(items = extraction.items.len(), "structured extraction finished");
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dpkg(name: &str, arch: &str) -> ScannedPackage {
        ScannedPackage {
            name: name.to_string(),
            version: "1.0-1".to_string(),
            metadata: PackageMetadata::Dpkg(DpkgMetadata {
                architecture: arch.to_string(),
                source_name: format!("{name}-src"),
                source_version: "1.0".to_string(),
                os_id: Some("debian".to_string()),
            }),
        }
    }

    fn unsupported(name: &str) -> ScannedPackage {
        ScannedPackage {
            name: name.to_string(),
            version: "2".to_string(),
            metadata: PackageMetadata::Unsupported {
                kind: "python".to_string(),
            },
        }
    }

    #[test]
    fn test_dpkg_item_mapping() {
        let item = InventoryItem::try_from(dpkg("curl", "amd64")).unwrap();

        assert_eq!(item.purl, "pkg:deb/debian/curl@1.0-1?arch=amd64");
        assert_eq!(item.source.name, "curl-src");
        let record = item.to_record();
        assert_eq!(record.arch, "x86_64");
        assert_eq!(record.raw_arch, "amd64");
    }

    #[test]
    fn test_unsupported_is_error() {
        let err = InventoryItem::try_from(unsupported("requests")).unwrap_err();
        assert!(err.is_per_item());
    }

    #[test]
    fn test_purl_without_os_id() {
        assert_eq!(dpkg_purl("a", "1", "all", None), "pkg:deb/linux/a@1?arch=all");
        assert_eq!(dpkg_purl("a", "1", "", Some("")), "pkg:deb/linux/a@1");
    }

    #[test]
    fn test_failed_scan() {
        let result = ScanResult {
            status: ScanStatus::Failed("no status file".to_string()),
            packages: vec![dpkg("curl", "amd64")],
        };

        let err = deconstruct_scan_result(result).unwrap_err();
        assert_eq!(err.to_string(), "scan failed, failure reason: no status file");
    }

    #[test]
    fn test_unmappable_items_are_skipped() {
        let result = ScanResult {
            status: ScanStatus::Succeeded,
            packages: vec![dpkg("curl", "amd64"), unsupported("requests"), dpkg("tar", "arm64")],
        };

        let extraction = deconstruct_scan_result(result).unwrap();
        assert_eq!(extraction.items.len(), 2);
        assert_eq!(extraction.skipped, 1);
        assert!(extraction.is_complete());
    }

    #[test]
    fn test_partial_scan_keeps_items() {
        let result = ScanResult {
            status: ScanStatus::PartiallySucceeded("1 stanza without version".to_string()),
            packages: vec![dpkg("curl", "amd64")],
        };

        let extraction = deconstruct_scan_result(result).unwrap();
        assert_eq!(extraction.items.len(), 1);
        assert_eq!(
            extraction.partial_failure.as_deref(),
            Some("1 stanza without version")
        );
    }
}
