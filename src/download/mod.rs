#[cfg(test)]
mod tests;

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crate::{
    checksums::ManifestEntry,
    digest::Sha256Digest,
    http::{HttpError, Stream, Transport},
    release::CatalogueError,
    signature::{Authenticator, SignatureError},
    variant::{ConfigurationError, Target},
    verify::{verify_and_extract, VerifyError},
    EventHandler,
};

/// Size of the buffer to copy the image from the server to the disk.
const CHUNK_SIZE: usize = 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{0}")]
    Catalogue(#[from] CatalogueError),

    #[error("Network error: {0}")]
    Network(#[from] HttpError),

    #[error("Trusted key is not available: {0}")]
    TrustKeyMissing(SignatureError),

    #[error("GPG signature verification failed for {url}: {source}")]
    SignatureInvalid { url: String, source: SignatureError },

    #[error("No ISO hash found in {0}")]
    ChecksumNotFound(String),

    #[error("Invalid filename in the manifest: {0:?}")]
    InvalidFilename(String),

    #[error("SHA-256 hash mismatch for {path}: expected {expected}, found {computed}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: Sha256Digest,
        computed: Sha256Digest,
    },

    #[error("I/O error in {1}: {0}")]
    Io(io::Error, PathBuf),
}

impl From<VerifyError> for Error {
    fn from(value: VerifyError) -> Self {
        match value {
            VerifyError::Http(e) => Error::Network(e),

            VerifyError::Signature { source, .. } if is_key_error(&source) => {
                Error::TrustKeyMissing(source)
            }

            VerifyError::Signature { url, source } => Error::SignatureInvalid { url, source },
        }
    }
}

fn is_key_error(error: &SignatureError) -> bool {
    matches!(
        error,
        SignatureError::KeyMissing(_)
            | SignatureError::KeyNotInKeyring { .. }
            | SignatureError::Io(..)
    )
}

macro_rules! try_io {
    ($path:expr, $e:expr $(,)?) => {
        $e.map_err(|e| Error::Io(io::Error::from(e), $path.into()))?
    };
}

/// Download the image described by `target` to the directory `output`,
/// and verify it.
///
/// The steps are:
///
/// 1. Download the checksum manifest, and verify its signature with
///    `authenticator`.
/// 2. Find the entry for the image in the manifest.
/// 3. Download the image.
/// 4. Compute the SHA-256 digest of the downloaded file.
///
/// If the digest does not match the manifest, the file is removed.
///
/// Returns the path of the downloaded file.
pub fn download<E: EventHandler>(
    target: &Target,
    transport: &impl Transport,
    authenticator: &impl Authenticator,
    event_handler: &E,
    output: &Path,
) -> Result<PathBuf, Error> {
    let entry = verify_and_extract(
        transport,
        authenticator,
        event_handler,
        &target.manifest_url,
        &target.signed_manifest_url,
        &target.selector,
    )?
    .ok_or_else(|| Error::ChecksumNotFound(target.manifest_url.clone()))?;

    let path = output.join(local_name(&entry)?);
    let url = format!("{}/{}", target.directory, entry.filename);

    let Stream {
        content_length,
        body,
    } = transport.open(&url)?;

    event_handler.download_start(&url, content_length);

    let file = try_io!(&path, File::create(&path));

    // From here, the file at `path` is the one written by this download.
    if let Err(e) = fetch(event_handler, &url, body, file, &path) {
        remove_artifact(event_handler, &path);
        return Err(e);
    }

    let computed = try_io!(&path, Sha256Digest::compute_file(&path));
    event_handler.local_digest(&computed);

    if computed != entry.digest {
        remove_artifact(event_handler, &path);
        return Err(Error::IntegrityMismatch {
            path,
            expected: entry.digest,
            computed,
        });
    }

    Ok(path)
}

/// Name of the local file for `entry`.
fn local_name(entry: &ManifestEntry) -> Result<&str, Error> {
    match entry.basename() {
        "" | "." | ".." => Err(Error::InvalidFilename(entry.filename.clone())),
        name => Ok(name),
    }
}

/// Copy the response `body` of `url` to `file`, created in `path`.
fn fetch<E: EventHandler>(
    event_handler: &E,
    url: &str,
    mut body: impl Read,
    file: File,
    path: &Path,
) -> Result<(), Error> {
    let mut output = BufWriter::new(file);
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(Error::Network(HttpError::Read {
                    url: url.to_owned(),
                    source,
                }))
            }
        };

        try_io!(path, output.write_all(&buffer[..n]));

        event_handler.download_progress_bytes(n);
    }

    let file = try_io!(path, output.into_inner());
    try_io!(path, file.sync_all());

    event_handler.download_finished(path);

    Ok(())
}

/// Remove a file that could not be verified.
///
/// Errors are ignored.
fn remove_artifact<E: EventHandler>(event_handler: &E, path: &Path) {
    if fs::remove_file(path).is_ok() {
        event_handler.artifact_removed(path);
    }
}
