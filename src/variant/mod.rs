//! Resolve the location of the images.
//!
//! Images are published in three hosts:
//!
//! * `releases.ubuntu.com` has Desktop and Server images of the
//!   supported releases. It can be replaced by a mirror.
//! * `cdimage.ubuntu.com` has the images of the development release,
//!   and the images of the other flavors.
//! * `archive.ubuntu.com` has the Netboot images, in the installer tree
//!   of the release.
//!
//! The naming conventions have changed over time, so some products
//! need exceptions for specific releases.

mod names;

use std::{borrow::Cow, fmt};

use crate::{
    checksums::Selector,
    release::{Release, Version},
};

pub use names::{Architecture, MediaClass, UnknownName, VariantKind};

const ARCHIVE_URL: &str = "https://archive.ubuntu.com";

const CDIMAGE_URL: &str = "https://cdimage.ubuntu.com";

const RELEASES_URL: &str = "https://releases.ubuntu.com";

/// Netboot images are only built for these architectures.
const NETBOOT_ARCHITECTURES: &[Architecture] = &[Architecture::Amd64, Architecture::I386];

/// Errors from [`Variant::new`].
///
/// They are detected before any network access.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("{variant} is only available for {supported}.")]
    UnsupportedArchitecture {
        variant: &'static str,
        arch: Architecture,
        supported: &'static str,
    },

    #[error("{variant} was discontinued after {last}.")]
    Discontinued {
        variant: &'static str,
        last: &'static str,
    },

    #[error("{variant} was not available until the {first} release.")]
    NotYetAvailable {
        variant: &'static str,
        first: &'static str,
    },

    #[error("Invalid mirror URL {0:?}: {1}")]
    InvalidMirror(String, String),
}

/// A product for a specific release and architecture.
///
/// # Examples
///
/// ```
/// # use ubuntu_iso_download::*;
/// let bionic = Release::new("bionic", "Bionic Beaver", "18.04".parse().unwrap(), true, true);
/// let server = Variant::new(VariantKind::Server, &bionic, Architecture::Amd64, None).unwrap();
///
/// assert_eq!(server.filename(), "ubuntu-18.04-live-server-amd64.iso");
/// assert_eq!(server.artifact_url(), "https://releases.ubuntu.com/18.04/ubuntu-18.04-live-server-amd64.iso");
/// ```
#[derive(Debug)]
pub struct Variant<'a> {
    kind: VariantKind,
    release: Cow<'a, Release>,
    arch: Architecture,
    mirror: Option<String>,
}

impl<'a> Variant<'a> {
    /// Validate the combination of product, release, and architecture.
    ///
    /// `mirror` replaces `releases.ubuntu.com` for Desktop and Server
    /// images. It is ignored if it is empty.
    pub fn new(
        kind: VariantKind,
        release: &'a Release,
        arch: Architecture,
        mirror: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let variant = kind.display_name();

        let release = match kind {
            VariantKind::Netboot => {
                if !NETBOOT_ARCHITECTURES.contains(&arch) {
                    return Err(ConfigurationError::UnsupportedArchitecture {
                        variant,
                        arch,
                        supported: "amd64 and i386",
                    });
                }

                if release.year() >= 20 {
                    return Err(ConfigurationError::Discontinued {
                        variant,
                        last: "19.10",
                    });
                }

                Cow::Borrowed(release)
            }

            VariantKind::Budgie if release.year() < 18 => {
                return Err(ConfigurationError::NotYetAvailable {
                    variant,
                    first: "18.04",
                });
            }

            // 18.04 was not an LTS release for Ubuntu Studio.
            VariantKind::Studio if release.year() == 18 && release.month() == 4 => {
                Cow::Owned(release.without_lts(Version::from_parts(18, 4)))
            }

            _ => Cow::Borrowed(release),
        };

        Ok(Variant {
            kind,
            release,
            arch,
            mirror: normalize_mirror(mirror)?,
        })
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    /// Release used to build the URLs.
    ///
    /// It may differ from the release given to [`Variant::new`] when
    /// the product has an exception for it.
    pub fn release(&self) -> &Release {
        &self.release
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    pub fn mirror(&self) -> Option<&str> {
        self.mirror.as_deref()
    }

    pub fn display_name(&self) -> &'static str {
        self.kind.display_name()
    }

    /// Path segment of the product in the image host.
    pub fn flavor(&self) -> &'static str {
        match self.kind {
            VariantKind::Server if !self.release.is_dev() => "ubuntu",
            kind => kind.flavor(),
        }
    }

    pub fn media_class(&self) -> MediaClass {
        match self.kind {
            VariantKind::Server if self.release.year() < 18 => MediaClass::Server,
            VariantKind::Server => MediaClass::LiveServer,
            VariantKind::Netboot => MediaClass::Mini,
            VariantKind::Studio => MediaClass::Dvd,
            _ => MediaClass::Desktop,
        }
    }

    /// URL of the directory with the image and the checksum manifest.
    pub fn directory(&self) -> String {
        let release = &self.release;
        let flavor = self.flavor();

        match self.kind {
            VariantKind::Netboot => format!(
                "{ARCHIVE_URL}/ubuntu/dists/{}/main/installer-{}/current/images",
                release.codename(),
                self.arch,
            ),

            VariantKind::Studio if release.is_dev() => {
                format!("{CDIMAGE_URL}/{flavor}/{}/current", self.media_class())
            }

            _ if release.is_dev() => format!("{CDIMAGE_URL}/{flavor}/daily-live/current"),

            kind if kind.has_release_host() => format!(
                "{}/{}",
                self.mirror().unwrap_or(RELEASES_URL),
                release.version()
            ),

            _ => format!(
                "{CDIMAGE_URL}/{flavor}/releases/{}/release",
                release.codename()
            ),
        }
    }

    /// Expected filename of the image.
    pub fn filename(&self) -> String {
        let release = &self.release;
        let class = self.media_class();
        let arch = self.arch;

        match self.kind {
            VariantKind::Netboot => "mini.iso".to_owned(),

            _ if release.is_dev() => format!("{}-{class}-{arch}.iso", release.codename()),

            _ => format!("{}-{}-{class}-{arch}.iso", self.flavor(), release.version()),
        }
    }

    pub fn artifact_url(&self) -> String {
        match self.kind {
            VariantKind::Netboot => format!("{}/netboot/{}", self.directory(), self.filename()),
            _ => format!("{}/{}", self.directory(), self.filename()),
        }
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/SHA256SUMS", self.directory())
    }

    pub fn signed_manifest_url(&self) -> String {
        format!("{}.gpg", self.manifest_url())
    }

    /// Rule to find the image in the checksum manifest.
    pub fn selector(&self) -> Selector {
        match self.kind {
            VariantKind::Netboot => Selector::LiteralSubstring(self.filename()),

            _ if self.release.is_dev() => Selector::ExactFilename(self.filename()),

            // Point releases replace the image, so the version in the
            // manifest may be newer than the version in the metadata.
            _ => Selector::SubstringPair {
                class: self.media_class(),
                arch: self.arch,
            },
        }
    }

    /// Compute all locations of the image.
    pub fn target(&self) -> Target {
        Target {
            display_name: self.display_name(),
            flavor: self.flavor(),
            media_class: self.media_class(),
            arch: self.arch,
            release: Release::clone(&self.release),
            directory: self.directory(),
            filename: self.filename(),
            artifact_url: self.artifact_url(),
            manifest_url: self.manifest_url(),
            signed_manifest_url: self.signed_manifest_url(),
            selector: self.selector(),
        }
    }
}

impl fmt::Display for Variant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {})",
            self.display_name(),
            self.release,
            self.release.codename(),
            self.arch
        )
    }
}

/// Resolved locations of an image.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Target {
    pub display_name: &'static str,
    pub flavor: &'static str,
    pub media_class: MediaClass,
    pub arch: Architecture,
    pub release: Release,
    pub directory: String,
    pub filename: String,
    pub artifact_url: String,
    pub manifest_url: String,
    pub signed_manifest_url: String,
    pub selector: Selector,
}

/// Resolve the locations of the image for `kind`, `release`, and `arch`.
///
/// This function does not access the network.
pub fn resolve(
    kind: VariantKind,
    release: &Release,
    arch: Architecture,
    mirror: Option<&str>,
) -> Result<Target, ConfigurationError> {
    Variant::new(kind, release, arch, mirror).map(|v| v.target())
}

/// Remove trailing slashes, and check that the mirror is a HTTP URL.
fn normalize_mirror(mirror: Option<&str>) -> Result<Option<String>, ConfigurationError> {
    let mirror = match mirror.map(|m| m.trim().trim_end_matches('/')) {
        None | Some("") => return Ok(None),
        Some(m) => m,
    };

    let invalid = |msg: String| ConfigurationError::InvalidMirror(mirror.to_owned(), msg);

    let url = url::Url::parse(mirror).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }

    Ok(Some(mirror.to_owned()))
}
