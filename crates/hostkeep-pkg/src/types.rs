//! Type definitions for package records

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical token for architecture-independent packages
pub const ARCH_ALL: &str = "all";

/// Map vendor architecture names onto one canonical spelling
///
/// Unknown names are returned lowercased.
#[must_use]
pub fn normalize_architecture(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "noarch" | "all" | "any" => ARCH_ALL.to_string(),
        "amd64" | "x86_64" | "x86-64" | "64-bit" => "x86_64".to_string(),
        "386" | "i386" | "i686" | "x86_32" | "32-bit" => "x86_32".to_string(),
        "arm64" | "aarch64" => "aarch64".to_string(),
        _ => lowered,
    }
}

/// Source package a binary package was built from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePackage {
    /// Source package name
    pub name: String,
    /// Source package version
    pub version: String,
}

/// One installed or updatable software unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name
    pub name: String,
    /// Normalized architecture
    pub arch: String,
    /// Architecture as reported by the package manager
    pub raw_arch: String,
    /// Package version
    pub version: String,
    /// Originating source package
    #[serde(default)]
    pub source: SourcePackage,
}

impl PackageRecord {
    /// Create a record, normalizing `raw_arch`
    pub fn new(
        name: impl Into<String>,
        raw_arch: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let raw_arch = raw_arch.into();
        Self {
            name: name.into(),
            arch: normalize_architecture(&raw_arch),
            raw_arch,
            version: version.into(),
            source: SourcePackage::default(),
        }
    }

    /// Set the source package
    #[must_use]
    pub fn with_source(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.source = SourcePackage {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    /// Identity used when comparing inventories
    #[must_use]
    pub fn key(&self) -> PackageKey {
        PackageKey {
            name: self.name.clone(),
            arch: self.arch.clone(),
            version: self.version.clone(),
        }
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.arch, self.version)
    }
}

/// `(name, arch, version)` identity of a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    /// Package name
    pub name: String,
    /// Normalized architecture
    pub arch: String,
    /// Package version
    pub version: String,
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.arch, self.version)
    }
}

/// Package manager type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerType {
    /// APT repositories (Debian/Ubuntu)
    Apt,
    /// Installed dpkg database
    Deb,
    /// Installed rpm database
    Rpm,
    /// Yum repositories (RHEL/CentOS)
    Yum,
}

impl fmt::Display for PackageManagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManagerType::Apt => write!(f, "apt"),
            PackageManagerType::Deb => write!(f, "deb"),
            PackageManagerType::Rpm => write!(f, "rpm"),
            PackageManagerType::Yum => write!(f, "yum"),
        }
    }
}

/// Package lists grouped by the manager that produced them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packages {
    /// Available apt updates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apt: Vec<PackageRecord>,
    /// Installed dpkg packages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deb: Vec<PackageRecord>,
    /// Installed rpm packages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rpm: Vec<PackageRecord>,
    /// Available yum updates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub yum: Vec<PackageRecord>,
}

impl Packages {
    /// List for one manager
    #[must_use]
    pub fn get(&self, manager: PackageManagerType) -> &[PackageRecord] {
        match manager {
            PackageManagerType::Apt => &self.apt,
            PackageManagerType::Deb => &self.deb,
            PackageManagerType::Rpm => &self.rpm,
            PackageManagerType::Yum => &self.yum,
        }
    }

    /// Replace the list for one manager
    pub fn set(&mut self, manager: PackageManagerType, records: Vec<PackageRecord>) {
        let slot = match manager {
            PackageManagerType::Apt => &mut self.apt,
            PackageManagerType::Deb => &mut self.deb,
            PackageManagerType::Rpm => &mut self.rpm,
            PackageManagerType::Yum => &mut self.yum,
        };
        *slot = records;
    }

    /// Every record across managers
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.apt
            .iter()
            .chain(&self.deb)
            .chain(&self.rpm)
            .chain(&self.yum)
    }

    /// Total number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.apt.len() + self.deb.len() + self.rpm.len() + self.yum.len()
    }

    /// Whether no manager reported anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_architecture() {
        assert_eq!(normalize_architecture("noarch"), "all");
        assert_eq!(normalize_architecture("all"), "all");
        assert_eq!(normalize_architecture("amd64"), "x86_64");
        assert_eq!(normalize_architecture("X86_64"), "x86_64");
        assert_eq!(normalize_architecture("i686"), "x86_32");
        assert_eq!(normalize_architecture("arm64"), "aarch64");
        assert_eq!(normalize_architecture("ppc64le"), "ppc64le");
    }

    #[test]
    fn test_record_key_ignores_source_and_raw_arch() {
        let a = PackageRecord::new("bash", "amd64", "5.1").with_source("bash", "5.1-2");
        let b = PackageRecord::new("bash", "x86_64", "5.1");

        assert_eq!(a.key(), b.key());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "bash x86_64 5.1");
    }

    #[test]
    fn test_packages_serialization_omits_empty_lists() {
        let mut packages = Packages::default();
        packages.set(
            PackageManagerType::Deb,
            vec![PackageRecord::new("bash", "amd64", "5.1")],
        );

        let json = serde_json::to_value(&packages).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("deb"));
        assert_eq!(packages.len(), 1);
        assert_eq!(packages.get(PackageManagerType::Deb)[0].arch, "x86_64");
    }
}
