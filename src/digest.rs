use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::Path,
    str::FromStr,
};

use digest::Digest as _;

/// Size of the blocks read from a file to compute its digest.
///
/// Images are several gigabytes, so they are never loaded in memory.
const CHUNK_SIZE: usize = 64 * 1024;

/// A SHA-256 digest.
///
/// The value is kept as a lowercase hexadecimal string, so two digests
/// are equal regardless of the case used in the source.
///
/// # Examples
///
/// ```
/// # use ubuntu_iso_download::*;
/// const DIGEST: &str = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
///
/// let expected: Sha256Digest = DIGEST.parse().unwrap();
/// let computed = Sha256Digest::compute(&b"abc"[..]).unwrap();
/// assert_eq!(expected, computed);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

/// Errors from the digest parser.
#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    #[error("Invalid digest value: {0:?}")]
    InvalidValue(String),
}

impl Sha256Digest {
    /// Length of the hexadecimal representation.
    const HEX_LEN: usize = 256 / 8 * 2;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compute the digest of all data in `reader`.
    pub fn compute<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = sha2::Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            hasher.update(&buffer[..n]);
        }

        Ok(Sha256Digest(HexString(hasher.finalize()).to_string()))
    }

    /// Compute the digest of the file in `path`.
    pub fn compute_file(path: &Path) -> io::Result<Self> {
        Self::compute(File::open(path)?)
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = DigestError;

    fn try_from(mut value: String) -> Result<Self, Self::Error> {
        // Validate that the value is a string with the expected length,
        // and it only contains hexadecimal digits.
        if value.len() != Self::HEX_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::InvalidValue(value));
        }

        value.make_ascii_lowercase();
        Ok(Sha256Digest(value))
    }
}

impl FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a byte buffer as hex string.
pub(crate) struct HexString<T>(pub T);

impl<T: AsRef<[u8]>> fmt::Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .as_ref()
            .iter()
            .try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

#[test]
fn encode_hex_bytes() {
    assert_eq!(HexString(b"\x01\x20\xf0").to_string(), "0120f0");
}

#[test]
fn compute_in_chunks() {
    use std::io::Cursor;

    // Digest for 200 KiB of `a`, larger than a single chunk.
    let data = vec![b'a'; 200 * 1024];
    let expected = HexString(sha2::Sha256::digest(&data)).to_string();

    let digest = Sha256Digest::compute(Cursor::new(&data)).unwrap();
    assert_eq!(digest.as_str(), expected);
}

#[test]
fn compute_file_digest() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"abc").unwrap();

    let digest = Sha256Digest::compute_file(file.path()).unwrap();
    assert_eq!(
        digest.as_str(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn reject_invalid_digest() {
    assert!(matches!(
        "0000".parse::<Sha256Digest>(),
        Err(DigestError::InvalidValue(_))
    ));

    assert!(matches!(
        format!("{:064}", "x").parse::<Sha256Digest>(),
        Err(DigestError::InvalidValue(_))
    ));
}
