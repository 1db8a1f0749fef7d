//! High-level package collection API
//!
//! Runs every available package-manager provider and, depending on the
//! [`ExtractionMode`], a structured extractor as well. One provider failing
//! never discards what the others reported.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hostkeep_pkg::{
    InstalledPackagesProvider, PackageManager, PackageManagerType, PackageRecord,
    PackageUpdatesProvider, Packages,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::InventoryError;
use crate::extractor::{ExtractionSource, Extractor};
use crate::reconcile::{ComparisonResult, compare, report_comparison};

/// How installed dpkg packages are discovered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Only the dpkg-query parser
    #[default]
    Legacy,
    /// Only the structured extractor
    Structured,
    /// Parser results are kept and compared against the extractor
    Verify,
}

/// A provider or extractor that did not contribute a complete result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionFailure {
    /// Which provider failed
    pub source: String,
    /// Error text
    pub message: String,
}

/// Result of one collection pass
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    /// Records grouped by manager
    pub packages: Packages,
    /// Providers that failed or only partially succeeded
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CollectionFailure>,
    /// Parser/extractor diff in verify mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonResult>,
    /// When collection started
    pub collected_at: DateTime<Utc>,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            packages: Packages::default(),
            failures: Vec::new(),
            comparison: None,
            collected_at: Utc::now(),
        }
    }
}

impl Collection {
    /// Every record across managers
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.records()
    }

    /// Whether every provider succeeded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, source: impl Into<String>, message: impl Into<String>) {
        let failure = CollectionFailure {
            source: source.into(),
            message: message.into(),
        };
        warn!(source = %failure.source, error = %failure.message, "collection step failed");
        self.failures.push(failure);
    }
}

/// Package collector
pub struct InventoryCollector {
    installed: Vec<Arc<dyn InstalledPackagesProvider>>,
    updates: Vec<Arc<dyn PackageUpdatesProvider>>,
    extractor: Option<Arc<dyn Extractor>>,
    sources: Vec<ExtractionSource>,
    mode: ExtractionMode,
}

impl InventoryCollector {
    /// Start building a collector
    #[must_use]
    pub fn builder() -> InventoryCollectorBuilder {
        InventoryCollectorBuilder::default()
    }

    /// Configured extraction mode
    #[must_use]
    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Collect installed packages
    ///
    /// Failures are recorded in [`Collection::failures`]; results from
    /// providers that succeeded are kept.
    #[instrument(skip(self), fields(mode = ?self.mode))]
    pub async fn installed_packages(&self) -> Collection {
        info!("collecting installed packages");
        let mut collection = Collection::default();

        for provider in &self.installed {
            let manager = provider.manager_type();
            if manager == PackageManagerType::Deb && self.mode == ExtractionMode::Structured {
                continue;
            }
            if !provider.is_available() {
                debug!(%manager, "package manager not available");
                continue;
            }
            match provider.installed_packages().await {
                Ok(records) => collection.packages.set(manager, records),
                Err(e) => collection.record_failure(manager.to_string(), e.to_string()),
            }
        }

        match self.mode {
            ExtractionMode::Legacy => {}
            ExtractionMode::Structured => {
                if let Some(records) = self.extract(&mut collection).await {
                    collection.packages.set(PackageManagerType::Deb, records);
                }
            }
            ExtractionMode::Verify => {
                if let Some(modern) = self.extract(&mut collection).await {
                    let result = compare(collection.packages.get(PackageManagerType::Deb), &modern);
                    report_comparison(&result);
                    collection.comparison = Some(result);
                }
            }
        }

        info!(
            packages = collection.packages.len(),
            failures = collection.failures.len(),
            "installed package collection completed"
        );
        collection
    }

    /// Collect available updates
    #[instrument(skip(self))]
    pub async fn package_updates(&self) -> Collection {
        info!("collecting package updates");
        let mut collection = Collection::default();

        for provider in &self.updates {
            let manager = provider.manager_type();
            if !provider.is_available() {
                debug!(%manager, "package manager not available");
                continue;
            }
            match provider.available_updates().await {
                Ok(records) => collection.packages.set(manager, records),
                Err(e) => collection.record_failure(manager.to_string(), e.to_string()),
            }
        }

        info!(
            updates = collection.packages.len(),
            failures = collection.failures.len(),
            "package update collection completed"
        );
        collection
    }

    /// Run the extractor, recording failure and partial results
    async fn extract(&self, collection: &mut Collection) -> Option<Vec<PackageRecord>> {
        let extractor = self.extractor.as_ref()?;

        match extractor.extract_inventory(&self.sources).await {
            Ok(extraction) => {
                if let Some(reason) = &extraction.partial_failure {
                    collection.record_failure(
                        "extractor",
                        format!("scan partially failed, failure reason: {reason}"),
                    );
                }
                Some(extraction.records())
            }
            Err(e) => {
                collection.record_failure("extractor", e.to_string());
                None
            }
        }
    }
}

/// Builder for [`InventoryCollector`]
#[derive(Default)]
pub struct InventoryCollectorBuilder {
    installed: Vec<Arc<dyn InstalledPackagesProvider>>,
    updates: Vec<Arc<dyn PackageUpdatesProvider>>,
    extractor: Option<Arc<dyn Extractor>>,
    sources: Vec<ExtractionSource>,
    mode: ExtractionMode,
}

impl InventoryCollectorBuilder {
    /// Add an installed-package provider
    #[must_use]
    pub fn with_installed(mut self, provider: Arc<dyn InstalledPackagesProvider>) -> Self {
        self.installed.push(provider);
        self
    }

    /// Add an update provider
    #[must_use]
    pub fn with_updates(mut self, provider: Arc<dyn PackageUpdatesProvider>) -> Self {
        self.updates.push(provider);
        self
    }

    /// Set the structured extractor and what it scans
    #[must_use]
    pub fn with_extractor(
        mut self,
        extractor: Arc<dyn Extractor>,
        sources: Vec<ExtractionSource>,
    ) -> Self {
        self.extractor = Some(extractor);
        self.sources = sources;
        self
    }

    /// Set the extraction mode
    #[must_use]
    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the collector
    ///
    /// # Errors
    /// Returns `InventoryError::ConfigError` if the mode needs an extractor
    /// and none was set.
    pub fn build(self) -> Result<InventoryCollector, InventoryError> {
        if self.mode != ExtractionMode::Legacy && self.extractor.is_none() {
            return Err(InventoryError::ConfigError(format!(
                "extraction mode {:?} requires an extractor",
                self.mode
            )));
        }

        Ok(InventoryCollector {
            installed: self.installed,
            updates: self.updates,
            extractor: self.extractor,
            sources: self.sources,
            mode: self.mode,
        })
    }
}
