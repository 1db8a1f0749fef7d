//! Package manager traits

use async_trait::async_trait;

use crate::error::PackageError;
use crate::types::{PackageManagerType, PackageRecord};

/// Identity and presence of a package manager on this host
pub trait PackageManager: Send + Sync {
    /// Which manager this is
    fn manager_type(&self) -> PackageManagerType;

    /// Whether the manager's binary is installed
    fn is_available(&self) -> bool;
}

/// Lists packages currently installed
#[async_trait]
pub trait InstalledPackagesProvider: PackageManager {
    /// Query the installed package database
    ///
    /// # Errors
    /// Returns `PackageError::Command` if the query command fails.
    async fn installed_packages(&self) -> Result<Vec<PackageRecord>, PackageError>;
}

/// Lists packages with a pending update
#[async_trait]
pub trait PackageUpdatesProvider: PackageManager {
    /// Query the repositories for available updates
    ///
    /// # Errors
    /// Returns `PackageError::Command` if any repository command fails.
    async fn available_updates(&self) -> Result<Vec<PackageRecord>, PackageError>;
}
