//! Catalogue of the Ubuntu releases.
//!
//! The catalogue is built from the meta-release files published in
//! <https://changelogs.ubuntu.com/>. `meta-release` lists every past and
//! present release, with a flag for its support status, and
//! `meta-release-development` adds the release under development.

use std::str::FromStr;

use crate::http::{HttpError, Transport};

use super::{Release, Version};

const META_RELEASE_URL: &str = "https://changelogs.ubuntu.com/meta-release";

const META_RELEASE_DEVELOPMENT_URL: &str =
    "https://changelogs.ubuntu.com/meta-release-development";

#[derive(thiserror::Error, Debug)]
pub enum CatalogueError {
    #[error("Unknown release {release:?}. Please choose from: {}", .supported.join(", "))]
    NotFound {
        release: String,
        supported: Vec<String>,
    },

    #[error("{release:?} is an unsupported release. Please choose from: {}", .supported.join(", "))]
    Unsupported {
        release: String,
        supported: Vec<String>,
    },

    #[error("No {0} release found.")]
    NoRelease(&'static str),

    #[error("Failed to download the release metadata: {0}")]
    Http(#[from] HttpError),

    #[error("Invalid release metadata: {0}")]
    InvalidRelease(String),
}

/// Source of release metadata.
pub trait ReleaseCatalogue {
    fn lookup_by_codename(&self, codename: &str) -> Result<&Release, CatalogueError>;

    /// Find a release by its version.
    ///
    /// If `version` has no point component (like `18.04`), any point
    /// release of the same year and month matches.
    fn lookup_by_version(&self, version: &str) -> Result<&Release, CatalogueError>;

    /// Newest LTS release that is not under development.
    fn latest_lts(&self) -> Result<&Release, CatalogueError>;

    /// Newest supported release that is not under development.
    fn stable(&self) -> Result<&Release, CatalogueError>;

    /// Supported releases, sorted by version.
    fn supported(&self) -> Vec<&Release>;

    /// Codenames of the supported releases.
    fn supported_codenames(&self) -> Vec<String> {
        self.supported()
            .iter()
            .map(|r| r.codename().to_owned())
            .collect()
    }

    /// Find the release requested by the user.
    ///
    /// `release` is a version if it contains a `.`, and a codename
    /// otherwise. If it is `None`, the latest LTS release is returned.
    ///
    /// Releases that are no longer supported are rejected.
    fn resolve(&self, release: Option<&str>) -> Result<&Release, CatalogueError> {
        let found = match release {
            None => return self.latest_lts(),
            Some(r) if r.contains('.') => self.lookup_by_version(r)?,
            Some(r) => self.lookup_by_codename(r)?,
        };

        if !found.is_within_support() {
            return Err(CatalogueError::Unsupported {
                release: found.codename().to_owned(),
                supported: self.supported_codenames(),
            });
        }

        Ok(found)
    }
}

/// Catalogue built from the meta-release files.
#[derive(Debug)]
pub struct MetaRelease {
    /// Releases sorted by version.
    releases: Vec<Release>,
}

impl MetaRelease {
    /// Download and parse the meta-release files.
    pub fn fetch(transport: &impl Transport) -> Result<Self, CatalogueError> {
        let stable = transport.get(META_RELEASE_URL)?;
        let development = transport.get(META_RELEASE_DEVELOPMENT_URL)?;

        Self::parse(
            &String::from_utf8_lossy(&stable),
            &String::from_utf8_lossy(&development),
        )
    }

    /// Parse the contents of the `meta-release` and
    /// `meta-release-development` files.
    ///
    /// Releases found only in `development` are marked as the
    /// development release.
    pub fn parse(stable: &str, development: &str) -> Result<Self, CatalogueError> {
        let mut releases = parse_paragraphs(stable)?;

        for release in parse_paragraphs(development)? {
            if !releases.iter().any(|r| r.codename == release.codename) {
                releases.push(release.into_development());
            }
        }

        Ok(Self::from_releases(releases))
    }

    pub fn from_releases(mut releases: Vec<Release>) -> Self {
        releases.sort_by(Release::cmp_version);
        MetaRelease { releases }
    }

    pub fn all(&self) -> &[Release] {
        &self.releases
    }

    fn not_found(&self, release: &str) -> CatalogueError {
        CatalogueError::NotFound {
            release: release.to_owned(),
            supported: self.supported_codenames(),
        }
    }

    fn newest<P>(&self, predicate: P) -> Option<&Release>
    where
        P: Fn(&Release) -> bool,
    {
        self.releases
            .iter()
            .filter(|r| predicate(r))
            .max_by(|a, b| a.cmp_version(b))
    }
}

impl ReleaseCatalogue for MetaRelease {
    fn lookup_by_codename(&self, codename: &str) -> Result<&Release, CatalogueError> {
        self.releases
            .iter()
            .find(|r| r.codename == codename)
            .ok_or_else(|| self.not_found(codename))
    }

    fn lookup_by_version(&self, version: &str) -> Result<&Release, CatalogueError> {
        let Ok(wanted) = Version::from_str(version) else {
            return Err(self.not_found(version));
        };

        if let Some(exact) = self.releases.iter().find(|r| r.version() == wanted.as_str()) {
            return Ok(exact);
        }

        let has_point = wanted.as_str().split('.').count() > 2;

        self.releases
            .iter()
            .filter(|r| r.year() == wanted.year() && r.month() == wanted.month())
            .filter(|r| !has_point || r.point() == wanted.point())
            .max_by(|a, b| a.cmp_version(b))
            .ok_or_else(|| self.not_found(version))
    }

    fn latest_lts(&self) -> Result<&Release, CatalogueError> {
        self.newest(|r| r.is_lts() && !r.is_dev())
            .ok_or(CatalogueError::NoRelease("LTS"))
    }

    fn stable(&self) -> Result<&Release, CatalogueError> {
        self.newest(|r| r.is_supported() && !r.is_dev())
            .ok_or(CatalogueError::NoRelease("stable"))
    }

    fn supported(&self) -> Vec<&Release> {
        self.releases
            .iter()
            .filter(|r| r.is_within_support())
            .collect()
    }
}

/// Fields of a paragraph in a meta-release file.
#[derive(Default)]
struct Paragraph<'a> {
    dist: Option<&'a str>,
    name: Option<&'a str>,
    version: Option<&'a str>,
    supported: Option<&'a str>,
    is_empty: bool,
}

impl<'a> Paragraph<'a> {
    fn new() -> Self {
        Paragraph {
            is_empty: true,
            ..Default::default()
        }
    }

    fn set(&mut self, line: &'a str) -> Result<(), CatalogueError> {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| CatalogueError::InvalidRelease(format!("invalid line {line:?}")))?;

        let slot = match key.trim() {
            "Dist" => &mut self.dist,
            "Name" => &mut self.name,
            "Version" => &mut self.version,
            "Supported" => &mut self.supported,
            _ => {
                self.is_empty = false;
                return Ok(());
            }
        };

        *slot = Some(value.trim());
        self.is_empty = false;
        Ok(())
    }

    fn into_release(self) -> Result<Release, CatalogueError> {
        let missing = |field: &str| CatalogueError::InvalidRelease(format!("missing field {field}"));

        let dist = self.dist.ok_or_else(|| missing("Dist"))?;
        let version_field = self.version.ok_or_else(|| missing("Version"))?;

        let version = Version::from_str(version_field)
            .map_err(|e| CatalogueError::InvalidRelease(format!("{dist}: {e}")))?;

        Ok(Release::new(
            dist,
            self.name.unwrap_or(dist),
            version,
            self.supported == Some("1"),
            version_field.contains("LTS"),
        ))
    }
}

/// Parse the releases in a meta-release file.
///
/// Each release is a paragraph of `Key: Value` lines. Paragraphs are
/// separated by blank lines.
fn parse_paragraphs(text: &str) -> Result<Vec<Release>, CatalogueError> {
    let mut releases = Vec::new();
    let mut paragraph = Paragraph::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            let done = std::mem::replace(&mut paragraph, Paragraph::new());
            if !done.is_empty {
                releases.push(done.into_release()?);
            }

            continue;
        }

        // Continuation lines only appear in fields that are not used.
        if line.starts_with([' ', '\t']) {
            continue;
        }

        paragraph.set(line)?;
    }

    if !paragraph.is_empty {
        releases.push(paragraph.into_release()?);
    }

    Ok(releases)
}
