//! Identity-keyed diff between two inventories
//!
//! Used to check that two extraction paths agree while migrating from one to
//! the other. Nothing here feeds back into collection results.

use std::collections::BTreeMap;

use hostkeep_pkg::{PackageKey, PackageRecord};
use serde::Serialize;
use tracing::{error, info};

/// Outcome of [`compare`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    /// Length of the legacy input, duplicates included
    pub legacy_items_count: usize,
    /// Length of the modern input, duplicates included
    pub modern_items_count: usize,
    /// Records only the legacy path reported, in key order
    pub legacy_extra: Vec<PackageRecord>,
    /// Records only the modern path reported, in key order
    pub modern_extra: Vec<PackageRecord>,
}

impl ComparisonResult {
    /// Whether both sides reported the same set of keys
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.legacy_extra.is_empty() && self.modern_extra.is_empty()
    }
}

/// Index records by identity; a later duplicate replaces an earlier one
fn index_by_key(records: &[PackageRecord]) -> BTreeMap<PackageKey, &PackageRecord> {
    records.iter().map(|r| (r.key(), r)).collect()
}

fn extra(
    side: &BTreeMap<PackageKey, &PackageRecord>,
    other: &BTreeMap<PackageKey, &PackageRecord>,
) -> Vec<PackageRecord> {
    side.iter()
        .filter(|(key, _)| !other.contains_key(*key))
        .map(|(_, record)| (*record).clone())
        .collect()
}

/// Diff two inventories by `(name, arch, version)`
#[must_use]
pub fn compare(legacy: &[PackageRecord], modern: &[PackageRecord]) -> ComparisonResult {
    let legacy_index = index_by_key(legacy);
    let modern_index = index_by_key(modern);

    ComparisonResult {
        legacy_items_count: legacy.len(),
        modern_items_count: modern.len(),
        legacy_extra: extra(&legacy_index, &modern_index),
        modern_extra: extra(&modern_index, &legacy_index),
    }
}

/// Log a comparison as indented JSON
pub fn report_comparison(result: &ComparisonResult) {
    match serde_json::to_string_pretty(result) {
        Ok(raw) => {
            info!(
                legacy = result.legacy_items_count,
                modern = result.modern_items_count,
                consistent = result.is_consistent(),
                "comparison results after inventory extraction"
            );
            info!("{raw}");
        }
        Err(e) => error!(error = %e, "unable to serialize comparison results"),
    }
}
