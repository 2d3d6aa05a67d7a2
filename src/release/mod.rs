mod catalogue;
mod version;

use std::{cmp::Ordering, fmt};

pub use catalogue::{CatalogueError, MetaRelease, ReleaseCatalogue};
pub use version::{Version, VersionError};

/// Metadata of an Ubuntu release.
///
/// Releases are sorted by their version components (`year`, `month`,
/// `point`), but two releases are only equal when their version strings
/// are the same. The codename is not part of the comparison.
///
/// # Examples
///
/// ```
/// # use ubuntu_iso_download::*;
/// let bionic = Release::new("bionic", "Bionic Beaver", "18.04.6 LTS".parse().unwrap(), true, true);
/// let focal = Release::new("focal", "Focal Fossa", "20.04".parse().unwrap(), true, true);
///
/// assert_eq!(bionic.version(), "18.04.6");
/// assert_eq!(bionic.point(), 6);
/// assert_eq!(focal.point(), 0);
/// assert!(bionic < focal);
/// ```
#[derive(Clone, Debug, serde::Serialize)]
pub struct Release {
    codename: String,
    name: String,
    version: Version,
    is_supported: bool,
    is_lts: bool,
    is_dev: bool,
}

impl Release {
    pub fn new(
        codename: impl Into<String>,
        name: impl Into<String>,
        version: Version,
        supported: bool,
        lts: bool,
    ) -> Self {
        Release {
            codename: codename.into(),
            name: name.into(),
            version,
            is_supported: supported,
            is_lts: lts,
            is_dev: false,
        }
    }

    /// Mark this release as the development release.
    ///
    /// Development releases are always supported.
    pub fn into_development(mut self) -> Self {
        self.is_dev = true;
        self.is_supported = true;
        self
    }

    /// Single, lowercase word, like `bionic`.
    pub fn codename(&self) -> &str {
        &self.codename
    }

    /// Full name, like `Bionic Beaver`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version string, without the `LTS` suffix.
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    pub fn year(&self) -> u32 {
        self.version.year()
    }

    pub fn month(&self) -> u32 {
        self.version.month()
    }

    pub fn point(&self) -> u32 {
        self.version.point()
    }

    pub fn is_supported(&self) -> bool {
        self.is_supported
    }

    pub fn is_lts(&self) -> bool {
        self.is_lts
    }

    pub fn is_dev(&self) -> bool {
        self.is_dev
    }

    /// Return `true` if images for this release can be downloaded.
    pub fn is_within_support(&self) -> bool {
        self.is_supported || self.is_dev
    }

    /// Copy of this release with the LTS flag cleared, and the version
    /// replaced by `version`.
    pub(crate) fn without_lts(&self, version: Version) -> Release {
        Release {
            version,
            is_lts: false,
            ..self.clone()
        }
    }

    /// Compare by version components only.
    pub(crate) fn cmp_version(&self, other: &Release) -> Ordering {
        self.version.key().cmp(&other.version.key())
    }
}

impl PartialEq for Release {
    fn eq(&self, other: &Self) -> bool {
        self.version.as_str() == other.version.as_str()
    }
}

impl PartialOrd for Release {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // Versions like `18.04` and `18.4` have the same components, but
        // they are not equal.
        match self.cmp_version(other) {
            Ordering::Equal if self != other => None,
            ordering => Some(ordering),
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_lts {
            write!(f, "{} LTS", self.version)
        } else {
            write!(f, "{}", self.version)
        }
    }
}
