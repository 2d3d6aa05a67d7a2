//! Parser for `SHA256SUMS` manifests.
//!
//! Each line of a manifest has the format generated by `sha256sum`:
//!
//! ```text
//! <hex-digest>  <filename>      (text mode)
//! <hex-digest> *<filename>      (binary mode)
//! ```
//!
//! Some manifests use a single space, and some filenames are prefixed
//! with `./`.


use crate::{
    digest::Sha256Digest,
    variant::{Architecture, MediaClass},
};

/// Entry of a checksum manifest.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ManifestEntry {
    pub digest: Sha256Digest,

    /// Path relative to the directory of the manifest, without the
    /// `*` and `./` prefixes.
    pub filename: String,
}

impl ManifestEntry {
    /// Last segment of the filename.
    pub fn basename(&self) -> &str {
        match self.filename.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.filename,
        }
    }
}

/// Rule to find the entry of an image in a manifest.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Filename must be exactly this value.
    ExactFilename(String),

    /// Filename must contain both the media class and the architecture.
    SubstringPair {
        class: MediaClass,
        arch: Architecture,
    },

    /// Filename must contain this text.
    LiteralSubstring(String),
}

impl Selector {
    pub fn matches(&self, entry: &ManifestEntry) -> bool {
        let filename = entry.filename.as_str();

        match self {
            Selector::ExactFilename(name) => filename == name,

            Selector::SubstringPair { class, arch } => {
                filename.contains(class.as_str()) && filename.contains(arch.as_str())
            }

            Selector::LiteralSubstring(text) => filename.contains(text.as_str()),
        }
    }
}

/// Parse a single line of a manifest.
///
/// Returns `None` if the line is not a valid entry.
pub fn parse_line(line: &str) -> Option<ManifestEntry> {
    let (digest, filename) = line.trim().split_once(' ')?;

    let filename = filename.strip_prefix(' ').unwrap_or(filename);
    let filename = filename.strip_prefix('*').unwrap_or(filename);
    let filename = filename.strip_prefix("./").unwrap_or(filename);

    if filename.is_empty() {
        return None;
    }

    let digest = digest.parse().ok()?;

    Some(ManifestEntry {
        digest,
        filename: filename.to_owned(),
    })
}

/// Iterate over the valid entries in a manifest.
pub fn entries(manifest: &str) -> impl Iterator<Item = ManifestEntry> + '_ {
    manifest.lines().filter_map(parse_line)
}

/// Find the entry matched by `selector`.
///
/// Manifests of daily images accumulate entries for every rebuild, so
/// when multiple lines match the last one is returned.
pub fn select(manifest: &str, selector: &Selector) -> Option<ManifestEntry> {
    entries(manifest).filter(|e| selector.matches(e)).last()
}
