//! hostkeep-inventory: package inventory extraction and reconciliation
//!
//! Combines the package-manager parsers from `hostkeep-pkg` with a pluggable
//! structured extractor, and diffs the two when migrating between them.

pub mod collector;
pub mod dpkg_status;
pub mod error;
pub mod extractor;
pub mod reconcile;

pub use collector::{
    Collection, CollectionFailure, ExtractionMode, InventoryCollector, InventoryCollectorBuilder,
};
pub use dpkg_status::DpkgStatusScanner;
pub use error::InventoryError;
pub use extractor::{
    DpkgMetadata, Extraction, ExtractionSource, Extractor, InventoryItem, PackageMetadata,
    ScanResult, ScanStatus, ScannedPackage, Scanner, StructuredExtractor,
};
pub use reconcile::{ComparisonResult, compare, report_comparison};
