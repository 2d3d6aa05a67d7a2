use std::path::Path;

use crate::{checksums::ManifestEntry, digest::Sha256Digest};

/// Handler to receive notifications for events during the download process.
///
/// Components never log on their own. Every diagnostic goes through the
/// handler they were given, so the caller decides how (and if) to show it.
///
/// All methods are optional.
#[expect(unused_variables)]
pub trait EventHandler {
    /// HTTP request to an image or release server.
    fn http_request(&self, url: &str) {}

    /// The checksum manifest was authenticated with the trusted key.
    fn signature_verified(&self, manifest_url: &str) {}

    /// An entry of the manifest was selected as the expected checksum.
    fn checksum_selected(&self, entry: &ManifestEntry) {}

    /// No entry of the manifest matched the selector.
    fn checksum_not_found(&self, manifest_url: &str) {}

    /// Start to download the image.
    ///
    /// `length` is the value from `Content-Length`, if the server sent it.
    fn download_start(&self, url: &str, length: Option<u64>) {}

    /// Some data (in `bytes`) has been received and written to disk.
    ///
    /// This method is invoked very frequently.
    fn download_progress_bytes(&self, bytes: usize) {}

    /// All the data has been written to `path`.
    fn download_finished(&self, path: &Path) {}

    /// The digest of the downloaded file has been computed.
    fn local_digest(&self, digest: &Sha256Digest) {}

    /// The downloaded file was removed because it could not be verified.
    fn artifact_removed(&self, path: &Path) {}
}

/// [`EventHandler`] instance to ignore all events.
pub struct NoEventHandler;

impl EventHandler for NoEventHandler {}
