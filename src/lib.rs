//! Download Ubuntu ISO images, and verify them with the signed checksum
//! manifests published with the images.
//!
//! The process has three stages:
//!
//! 1. Resolve the location of the image ([`resolve`]) from the product,
//!    the release ([`ReleaseCatalogue`]), and the architecture.
//! 2. Authenticate the checksum manifest with the trusted key, and find
//!    the expected digest of the image ([`verify_and_extract`]).
//! 3. Download the image, and compare its digest ([`download`]).

mod checksums;
mod digest;
mod download;
mod event_handler;
mod http;
mod release;
mod signature;
mod variant;
mod verify;

pub use checksums::{ManifestEntry, Selector};
pub use digest::{DigestError, Sha256Digest};
pub use download::{download, Error};
pub use event_handler::{EventHandler, NoEventHandler};
pub use http::{Client, HttpError, Stream, Transport};
pub use release::{CatalogueError, MetaRelease, Release, ReleaseCatalogue, Version, VersionError};
pub use signature::{
    default_keyring_path, Authenticator, SignatureError, TrustedKey, UBUNTU_CD_KEY_ID,
};
pub use variant::{
    resolve, Architecture, ConfigurationError, MediaClass, Target, UnknownName, Variant,
    VariantKind,
};
pub use verify::{verify_and_extract, VerifyError};
