//! Verify detached OpenPGP signatures.
//!
//! The checksum manifests are signed by the Ubuntu CD Image Automatic
//! Signing Key:
//!
//! ```text
//! pub   rsa4096 2012-05-11 [SC]
//!       843938DF228D22F7B3742BC0D94AA3F0EFE21092
//! uid   Ubuntu CD Image Automatic Signing Key (2012) <cdimage@ubuntu.com>
//! ```
//!
//! It is included in the `ubuntu-archive-keyring.gpg` file of the
//! `ubuntu-keyring` package.

use std::{
    ffi::OsStr,
    io::{self, Cursor},
    path::{Path, PathBuf},
};

use pgp::{types::PublicKeyTrait, Deserializable, SignedPublicKey, StandaloneSignature};

use crate::digest::HexString;

/// Long ID of the key used to sign the checksum manifests.
pub const UBUNTU_CD_KEY_ID: &str = "D94AA3F0EFE21092";

/// Location of the keyring in the `ubuntu-keyring` package.
const KEYRING_PATH: &str = "usr/share/keyrings/ubuntu-archive-keyring.gpg";

const ARMOR_HEADER: &[u8] = b"-----BEGIN PGP ";

#[derive(thiserror::Error, Debug)]
pub enum SignatureError {
    #[error("Public key not found at {0}")]
    KeyMissing(PathBuf),

    #[error("No key with ID {key_id} in {source_name}")]
    KeyNotInKeyring { key_id: String, source_name: String },

    #[error("Failed to read {1}: {0}")]
    Io(io::Error, PathBuf),

    #[error("Invalid signature data: {0}")]
    Malformed(String),

    #[error("Signature could not be verified with key {0}")]
    Invalid(String),
}

/// Check that some data was signed by a trusted party.
pub trait Authenticator {
    /// Verify that `signature` is a valid detached signature for `data`.
    fn authenticate(&self, data: &[u8], signature: &[u8]) -> Result<(), SignatureError>;
}

/// Public key material containing a trusted key.
///
/// The material is kept as bytes. Every call to
/// [`authenticate`](Authenticator::authenticate) parses it into a new
/// keyring, which is dropped before returning, so no trust state is
/// shared between verifications. The user's GnuPG home is never used.
#[derive(Debug)]
pub struct TrustedKey {
    key_id: String,
    material: Vec<u8>,
}

impl TrustedKey {
    /// Load the keyring in `path`, and check that it contains the
    /// Ubuntu CD signing key.
    pub fn load(path: &Path) -> Result<Self, SignatureError> {
        let material = match std::fs::read(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SignatureError::KeyMissing(path.to_owned()))
            }
            Err(e) => return Err(SignatureError::Io(e, path.to_owned())),
        };

        let key = TrustedKey {
            key_id: UBUNTU_CD_KEY_ID.to_owned(),
            material,
        };

        key.check_key(&path.display().to_string())?;
        Ok(key)
    }

    /// Use `material` (binary or ASCII-armored) as the keyring, and
    /// trust the key with the long ID `key_id`.
    pub fn from_bytes(material: Vec<u8>, key_id: &str) -> Result<Self, SignatureError> {
        let key = TrustedKey {
            key_id: key_id.to_ascii_uppercase(),
            material,
        };

        key.check_key("key material")?;
        Ok(key)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn check_key(&self, source_name: &str) -> Result<(), SignatureError> {
        match self.find_certificate() {
            Some(_) => Ok(()),
            None => Err(SignatureError::KeyNotInKeyring {
                key_id: self.key_id.clone(),
                source_name: source_name.to_owned(),
            }),
        }
    }

    /// Parse the key material, and return the certificate with the
    /// trusted key, either as its primary key or as a subkey.
    fn find_certificate(&self) -> Option<SignedPublicKey> {
        parse_many::<SignedPublicKey>(&self.material)
            .into_iter()
            .find(|cert| {
                self.is_trusted(&cert.primary_key)
                    || cert.public_subkeys.iter().any(|s| self.is_trusted(&s.key))
            })
    }

    fn is_trusted(&self, key: &impl PublicKeyTrait) -> bool {
        let id = HexString(key.key_id()).to_string();
        id.eq_ignore_ascii_case(&self.key_id)
    }
}

impl Authenticator for TrustedKey {
    fn authenticate(&self, data: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        let signatures = parse_many::<StandaloneSignature>(signature);
        if signatures.is_empty() {
            return Err(SignatureError::Malformed(
                "no OpenPGP signature found".to_owned(),
            ));
        }

        let cert = self
            .find_certificate()
            .ok_or_else(|| SignatureError::KeyNotInKeyring {
                key_id: self.key_id.clone(),
                source_name: "key material".to_owned(),
            })?;

        // Manifests can be signed by multiple keys. Only one signature
        // from the trusted certificate is needed.
        let verified = signatures.iter().any(|sig| {
            sig.verify(&cert.primary_key, data).is_ok()
                || cert
                    .public_subkeys
                    .iter()
                    .any(|sub| sig.verify(&sub.key, data).is_ok())
        });

        if verified {
            Ok(())
        } else {
            Err(SignatureError::Invalid(self.key_id.clone()))
        }
    }
}

/// Path of the keyring with the Ubuntu CD signing key.
///
/// When running inside a snap, the keyring is in `$SNAP`.
pub fn default_keyring_path() -> PathBuf {
    keyring_path(std::env::var_os("SNAP").as_deref())
}

fn keyring_path(snap: Option<&OsStr>) -> PathBuf {
    match snap {
        Some(root) if !root.is_empty() => Path::new(root).join(KEYRING_PATH),
        _ => Path::new("/").join(KEYRING_PATH),
    }
}

/// Parse every packet of type `T` in `data`.
///
/// Items that can't be parsed are skipped, since keyrings may contain
/// keys with algorithms that are not supported.
fn parse_many<T: Deserializable>(data: &[u8]) -> Vec<T> {
    if data.starts_with(ARMOR_HEADER) {
        match T::from_armor_many(Cursor::new(data)) {
            Ok((items, _)) => items.filter_map(Result::ok).collect(),
            Err(_) => Vec::new(),
        }
    } else {
        T::from_bytes_many(Cursor::new(data))
            .filter_map(Result::ok)
            .collect()
    }
}

#[test]
fn missing_keyring() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyring.gpg");

    match TrustedKey::load(&path) {
        Err(SignatureError::KeyMissing(p)) => assert_eq!(p, path),
        r => panic!("Unexpected result: {r:?}"),
    }
}

#[test]
fn keyring_without_trusted_key() {
    let dir = tempfile::tempdir().unwrap();

    for (name, contents) in [
        ("empty.gpg", &b""[..]),
        ("garbage.gpg", &b"not a key"[..]),
        ("armored.asc", &b"-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nxx\n"[..]),
    ] {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();

        match TrustedKey::load(&path) {
            Err(SignatureError::KeyNotInKeyring { key_id, .. }) => {
                assert_eq!(key_id, UBUNTU_CD_KEY_ID)
            }
            r => panic!("Unexpected result for {name}: {r:?}"),
        }
    }
}

#[test]
fn key_id_from_bytes() {
    assert!(matches!(
        TrustedKey::from_bytes(Vec::new(), "d94aa3f0efe21092"),
        Err(SignatureError::KeyNotInKeyring { key_id, .. }) if key_id == UBUNTU_CD_KEY_ID
    ));
}

#[test]
fn keyring_path_in_snap() {
    assert_eq!(
        keyring_path(None),
        Path::new("/usr/share/keyrings/ubuntu-archive-keyring.gpg")
    );

    assert_eq!(
        keyring_path(Some(OsStr::new(""))),
        Path::new("/usr/share/keyrings/ubuntu-archive-keyring.gpg")
    );

    assert_eq!(
        keyring_path(Some(OsStr::new("/snap/ubuntu-iso-download/12"))),
        Path::new("/snap/ubuntu-iso-download/12/usr/share/keyrings/ubuntu-archive-keyring.gpg")
    );
}

/// Keys and signatures generated with GnuPG, described in
/// `testdata/signature/README.md`.
#[cfg(test)]
macro_rules! fixture {
    ($name:literal) => {
        include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/testdata/signature/",
            $name
        ))
    };
}

#[cfg(test)]
const SIGNING_KEY_ID: &str = "0C1473FC7EF62318";

#[cfg(test)]
const SIGNING_SUBKEY_ID: &str = "6FB3D3FB4A25C280";

#[cfg(test)]
const OTHER_KEY_ID: &str = "E1B2A1025F60C797";

#[test]
fn verify_binary_signature() {
    let key = TrustedKey::from_bytes(fixture!("keyring.gpg").to_vec(), SIGNING_KEY_ID).unwrap();

    key.authenticate(fixture!("SHA256SUMS"), fixture!("SHA256SUMS.gpg"))
        .unwrap();
}

#[test]
fn verify_armored_signature() {
    let key =
        TrustedKey::from_bytes(fixture!("signing-key.asc").to_vec(), SIGNING_KEY_ID).unwrap();

    key.authenticate(fixture!("SHA256SUMS"), fixture!("SHA256SUMS.asc"))
        .unwrap();
}

#[test]
fn reject_modified_data() {
    let key = TrustedKey::from_bytes(fixture!("keyring.gpg").to_vec(), SIGNING_KEY_ID).unwrap();

    let mut data = fixture!("SHA256SUMS").to_vec();
    data[0] ^= 1;

    for signature in [&fixture!("SHA256SUMS.gpg")[..], &fixture!("SHA256SUMS.asc")[..]] {
        match key.authenticate(&data, signature) {
            Err(SignatureError::Invalid(id)) => assert_eq!(id, SIGNING_KEY_ID),
            r => panic!("Unexpected result: {r:?}"),
        }
    }
}

#[test]
fn reject_signature_from_other_key() {
    let key = TrustedKey::from_bytes(fixture!("keyring.gpg").to_vec(), SIGNING_KEY_ID).unwrap();

    assert!(matches!(
        key.authenticate(fixture!("SHA256SUMS"), fixture!("SHA256SUMS.other.gpg")),
        Err(SignatureError::Invalid(_))
    ));

    // Same keyring, but trusting the other key.
    let other = TrustedKey::from_bytes(fixture!("keyring.gpg").to_vec(), OTHER_KEY_ID).unwrap();

    other
        .authenticate(fixture!("SHA256SUMS"), fixture!("SHA256SUMS.other.gpg"))
        .unwrap();

    assert!(matches!(
        other.authenticate(fixture!("SHA256SUMS"), fixture!("SHA256SUMS.gpg")),
        Err(SignatureError::Invalid(_))
    ));
}

#[test]
fn trust_key_by_subkey_id() {
    let key = TrustedKey::from_bytes(
        fixture!("keyring.gpg").to_vec(),
        &SIGNING_SUBKEY_ID.to_ascii_lowercase(),
    )
    .unwrap();

    assert_eq!(key.key_id(), SIGNING_SUBKEY_ID);

    key.authenticate(fixture!("SHA256SUMS"), fixture!("SHA256SUMS.subkey.gpg"))
        .unwrap();

    key.authenticate(fixture!("SHA256SUMS"), fixture!("SHA256SUMS.gpg"))
        .unwrap();
}

#[test]
fn any_valid_signature_is_enough() {
    let key = TrustedKey::from_bytes(fixture!("keyring.gpg").to_vec(), SIGNING_KEY_ID).unwrap();

    let signatures = [
        &fixture!("SHA256SUMS.other.gpg")[..],
        &fixture!("SHA256SUMS.gpg")[..],
    ]
    .concat();

    key.authenticate(fixture!("SHA256SUMS"), &signatures)
        .unwrap();
}

#[test]
fn malformed_signature() {
    let key = TrustedKey::from_bytes(fixture!("keyring.gpg").to_vec(), SIGNING_KEY_ID).unwrap();

    assert!(matches!(
        key.authenticate(fixture!("SHA256SUMS"), b"not a signature"),
        Err(SignatureError::Malformed(_))
    ));
}

#[test]
fn load_keyring_without_ubuntu_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyring.gpg");
    std::fs::write(&path, fixture!("other-key.gpg")).unwrap();

    assert!(matches!(
        TrustedKey::load(&path),
        Err(SignatureError::KeyNotInKeyring { .. })
    ));

    assert!(matches!(
        TrustedKey::from_bytes(fixture!("other-key.gpg").to_vec(), SIGNING_KEY_ID),
        Err(SignatureError::KeyNotInKeyring { .. })
    ));
}
