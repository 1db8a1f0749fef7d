//! hostkeep-pkg: package records and package-manager providers
//!
//! Each provider shells out through a [`hostkeep_exec::CommandRunner`] and
//! turns the tool's output into [`PackageRecord`]s with normalized
//! architectures.

pub mod apt;
mod command;
pub mod dpkg;
pub mod error;
pub mod rpm;
pub mod traits;
pub mod types;
pub mod yum;

pub use apt::AptManager;
pub use dpkg::DpkgQuery;
pub use error::PackageError;
pub use rpm::RpmQuery;
pub use traits::{InstalledPackagesProvider, PackageManager, PackageUpdatesProvider};
pub use types::{
    PackageKey, PackageManagerType, PackageRecord, Packages, SourcePackage,
    normalize_architecture,
};
pub use yum::YumManager;
