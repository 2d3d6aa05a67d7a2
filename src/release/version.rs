use std::{fmt, str::FromStr};

/// Errors from [`Version::from_str`].
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum VersionError {
    #[error("Invalid release version: {0:?}")]
    Invalid(String),
}

/// Version of an Ubuntu release, like `18.04` or `18.04.6`.
///
/// The ` LTS` suffix used in the release metadata (`18.04.6 LTS`) is
/// accepted and discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version {
    text: String,
    year: u32,
    month: u32,
    point: u32,
}

impl Version {
    pub(crate) fn from_parts(year: u32, month: u32) -> Self {
        Version {
            text: format!("{year:02}.{month:02}"),
            year,
            month,
            point: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Point release. It is `0` if the version has no point component.
    pub fn point(&self) -> u32 {
        self.point
    }

    /// Key to sort versions.
    pub(crate) fn key(&self) -> (u32, u32, u32) {
        (self.year, self.month, self.point)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let text = text.strip_suffix(" LTS").unwrap_or(text).trim_end();

        let invalid = || VersionError::Invalid(s.to_owned());

        let number = |part: Option<&str>| -> Result<u32, VersionError> {
            match part {
                Some(p) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => {
                    p.parse().map_err(|_| invalid())
                }
                _ => Err(invalid()),
            }
        };

        let mut parts = text.split('.');
        let year = number(parts.next())?;
        let month = number(parts.next())?;
        let point = match parts.next() {
            None => 0,
            part => number(part)?,
        };

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Version {
            text: text.to_owned(),
            year,
            month,
            point,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl serde::Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

#[test]
fn parse_versions() {
    macro_rules! check {
        ($input:expr, $text:expr, [$year:expr, $month:expr, $point:expr]) => {
            let version = Version::from_str($input).unwrap();
            assert_eq!(version.as_str(), $text);
            assert_eq!(version.key(), ($year, $month, $point));
        };
    }

    check!("18.04", "18.04", [18, 4, 0]);
    check!("18.04.6", "18.04.6", [18, 4, 6]);
    check!("18.04.6 LTS", "18.04.6", [18, 4, 6]);
    check!("04.10", "04.10", [4, 10, 0]);
    check!(" 20.10 ", "20.10", [20, 10, 0]);
}

#[test]
fn reject_invalid_versions() {
    for input in ["", "18", "18.", "a.04", "18.04.x", "18.04.1.2", "-1.04", "18.04 beta"] {
        assert_eq!(
            Version::from_str(input),
            Err(VersionError::Invalid(input.to_owned())),
            "{input:?}"
        );
    }
}

#[test]
fn version_from_parts() {
    let version = Version::from_parts(18, 4);
    assert_eq!(version, Version::from_str("18.04").unwrap());
}
