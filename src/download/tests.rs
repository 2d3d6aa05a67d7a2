use std::cell::RefCell;

use super::*;
use crate::{
    http::tests::FakeTransport,
    release::Release,
    signature::testing::{sign, Reversed},
    variant::{resolve, Architecture, VariantKind},
};

const MIRROR: &str = "https://mirror.test/ubuntu-releases";

const ISO_URL: &str = "https://mirror.test/ubuntu-releases/18.04/ubuntu-18.04.6-desktop-amd64.iso";
const MANIFEST_URL: &str = "https://mirror.test/ubuntu-releases/18.04/SHA256SUMS";
const SIGNATURE_URL: &str = "https://mirror.test/ubuntu-releases/18.04/SHA256SUMS.gpg";

/// Contents of the fake image. It is larger than a single chunk.
fn iso_data() -> Vec<u8> {
    (0..CHUNK_SIZE * 2 + 100).map(|n| (n % 251) as u8).collect()
}

fn bionic_desktop() -> Target {
    let bionic = Release::new("bionic", "Bionic Beaver", "18.04".parse().unwrap(), true, true);
    resolve(VariantKind::Desktop, &bionic, Architecture::Amd64, Some(MIRROR)).unwrap()
}

fn manifest(digest: &Sha256Digest) -> String {
    format!(
        "{}  ubuntu-18.04.5-desktop-amd64.iso\n\
         {digest} *ubuntu-18.04.6-desktop-amd64.iso\n\
         {} *ubuntu-18.04.6-live-server-amd64.iso\n",
        "0".repeat(64),
        "1".repeat(64),
    )
}

fn transport(manifest: String, iso: Vec<u8>) -> FakeTransport {
    FakeTransport::default()
        .with(SIGNATURE_URL, sign(&manifest))
        .with(MANIFEST_URL, manifest)
        .with(ISO_URL, iso)
}

#[derive(Default)]
struct Events {
    log: RefCell<Vec<String>>,
    progress: RefCell<usize>,
}

impl EventHandler for Events {
    fn download_start(&self, url: &str, length: Option<u64>) {
        self.log.borrow_mut().push(format!("start {url} {length:?}"));
    }

    fn download_progress_bytes(&self, bytes: usize) {
        *self.progress.borrow_mut() += bytes;
    }

    fn download_finished(&self, path: &Path) {
        let name = path.file_name().unwrap().to_string_lossy();
        self.log.borrow_mut().push(format!("finished {name}"));
    }

    fn local_digest(&self, digest: &Sha256Digest) {
        self.log.borrow_mut().push(format!("digest {digest}"));
    }

    fn artifact_removed(&self, path: &Path) {
        let name = path.file_name().unwrap().to_string_lossy();
        self.log.borrow_mut().push(format!("removed {name}"));
    }
}

#[test]
fn download_and_verify() {
    let data = iso_data();
    let digest = Sha256Digest::compute(&data[..]).unwrap();

    let transport = transport(manifest(&digest), data.clone());
    let events = Events::default();
    let output = tempfile::tempdir().unwrap();

    let path = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &events,
        output.path(),
    )
    .unwrap();

    assert_eq!(path, output.path().join("ubuntu-18.04.6-desktop-amd64.iso"));
    assert_eq!(fs::read(&path).unwrap(), data);

    assert_eq!(*events.progress.borrow(), data.len());
    assert_eq!(
        *events.log.borrow(),
        [
            format!("start {ISO_URL} Some({})", data.len()),
            "finished ubuntu-18.04.6-desktop-amd64.iso".to_owned(),
            format!("digest {digest}"),
        ]
    );
}

#[test]
fn uppercase_digest_in_manifest() {
    let data = iso_data();
    let digest = Sha256Digest::compute(&data[..]).unwrap();

    let manifest = manifest(&digest).replace(digest.as_str(), &digest.as_str().to_uppercase());
    let transport = transport(manifest, data);
    let output = tempfile::tempdir().unwrap();

    let result = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &crate::NoEventHandler,
        output.path(),
    );

    assert!(result.is_ok(), "{result:?}");
}

#[test]
fn remove_file_on_mismatch() {
    let data = iso_data();
    let digest = Sha256Digest::compute(&b"other data"[..]).unwrap();

    let transport = transport(manifest(&digest), data);
    let events = Events::default();
    let output = tempfile::tempdir().unwrap();

    let result = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &events,
        output.path(),
    );

    let path = output.path().join("ubuntu-18.04.6-desktop-amd64.iso");

    match result {
        Err(Error::IntegrityMismatch {
            path: p, expected, ..
        }) => {
            assert_eq!(p, path);
            assert_eq!(expected, digest);
        }
        r => panic!("Unexpected result: {r:?}"),
    }

    assert!(!path.exists());
    assert_eq!(
        events.log.borrow().last().unwrap(),
        "removed ubuntu-18.04.6-desktop-amd64.iso"
    );
}

#[test]
fn checksum_not_found() {
    let manifest = format!("{}  ubuntu-18.04.6-desktop-arm64.iso\n", "2".repeat(64));
    let transport = transport(manifest, iso_data());
    let output = tempfile::tempdir().unwrap();

    let result = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &crate::NoEventHandler,
        output.path(),
    );

    match result {
        Err(Error::ChecksumNotFound(url)) => assert_eq!(url, MANIFEST_URL),
        r => panic!("Unexpected result: {r:?}"),
    }

    assert!(!transport.requested(ISO_URL));
}

#[test]
fn invalid_signature_prevents_download() {
    let data = iso_data();
    let digest = Sha256Digest::compute(&data[..]).unwrap();

    let transport = FakeTransport::default()
        .with(MANIFEST_URL, manifest(&digest))
        .with(SIGNATURE_URL, &b"not a signature"[..])
        .with(ISO_URL, data);

    let output = tempfile::tempdir().unwrap();

    let result = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &crate::NoEventHandler,
        output.path(),
    );

    match result {
        Err(Error::SignatureInvalid { url, .. }) => assert_eq!(url, SIGNATURE_URL),
        r => panic!("Unexpected result: {r:?}"),
    }

    assert!(transport.requested(MANIFEST_URL));
    assert!(!transport.requested(ISO_URL));
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}

#[test]
fn missing_trusted_key() {
    struct NoKey;

    impl Authenticator for NoKey {
        fn authenticate(&self, _: &[u8], _: &[u8]) -> Result<(), SignatureError> {
            Err(SignatureError::KeyMissing("/nonexistent".into()))
        }
    }

    let transport = transport(manifest(&Sha256Digest::compute(&b""[..]).unwrap()), vec![]);
    let output = tempfile::tempdir().unwrap();

    let result = download(
        &bionic_desktop(),
        &transport,
        &NoKey,
        &crate::NoEventHandler,
        output.path(),
    );

    assert!(matches!(result, Err(Error::TrustKeyMissing(_))));
}

#[test]
fn missing_image() {
    let digest = Sha256Digest::compute(&b""[..]).unwrap();
    let manifest = manifest(&digest);

    let transport = FakeTransport::default()
        .with(SIGNATURE_URL, sign(&manifest))
        .with(MANIFEST_URL, manifest);

    let output = tempfile::tempdir().unwrap();

    let result = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &crate::NoEventHandler,
        output.path(),
    );

    assert!(matches!(
        result,
        Err(Error::Network(HttpError::Status { code: 404, .. }))
    ));
}

#[test]
fn reject_unsafe_filenames() {
    let bionic = Release::new("bionic", "Bionic Beaver", "18.04".parse().unwrap(), true, true);
    let target = resolve(VariantKind::Netboot, &bionic, Architecture::Amd64, None).unwrap();

    let manifest = format!("{}  ./netboot/mini.iso/..\n", "3".repeat(64));
    let transport = FakeTransport::default()
        .with(&target.signed_manifest_url, sign(&manifest))
        .with(&target.manifest_url, manifest);

    let output = tempfile::tempdir().unwrap();

    let result = download(
        &target,
        &transport,
        &Reversed,
        &crate::NoEventHandler,
        output.path(),
    );

    assert!(matches!(result, Err(Error::InvalidFilename(_))));
}

#[test]
fn netboot_is_saved_as_mini_iso() {
    let bionic = Release::new("bionic", "Bionic Beaver", "18.04".parse().unwrap(), true, true);
    let target = resolve(VariantKind::Netboot, &bionic, Architecture::I386, None).unwrap();

    let data = b"netboot image".to_vec();
    let digest = Sha256Digest::compute(&data[..]).unwrap();

    let manifest = format!(
        "{}  ./netboot/ubuntu-installer/i386/linux\n{digest}  ./netboot/mini.iso\n",
        "4".repeat(64)
    );

    let transport = FakeTransport::default()
        .with(&target.signed_manifest_url, sign(&manifest))
        .with(&target.manifest_url, manifest)
        .with(&target.artifact_url, data);

    let output = tempfile::tempdir().unwrap();

    let path = download(
        &target,
        &transport,
        &Reversed,
        &crate::NoEventHandler,
        output.path(),
    )
    .unwrap();

    assert_eq!(path, output.path().join("mini.iso"));
    assert!(transport.requested(&target.artifact_url));
}

#[test]
fn keep_existing_file_when_image_is_missing() {
    let digest = Sha256Digest::compute(&b"previous image"[..]).unwrap();
    let manifest = manifest(&digest);

    let transport = FakeTransport::default()
        .with(SIGNATURE_URL, sign(&manifest))
        .with(MANIFEST_URL, manifest);

    let output = tempfile::tempdir().unwrap();
    let path = output.path().join("ubuntu-18.04.6-desktop-amd64.iso");
    fs::write(&path, b"previous image").unwrap();

    let events = Events::default();

    let result = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &events,
        output.path(),
    );

    assert!(matches!(result, Err(Error::Network(_))), "{result:?}");
    assert_eq!(fs::read(&path).unwrap(), b"previous image");
    assert!(events.log.borrow().is_empty());
}

#[test]
fn remove_partial_file_on_read_error() {
    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    struct BrokenImage(FakeTransport);

    impl Transport for BrokenImage {
        fn open(&self, url: &str) -> Result<Stream, HttpError> {
            if url == ISO_URL {
                return Ok(Stream {
                    content_length: Some(1000),
                    body: Box::new(Read::chain(&b"partial"[..], Broken)),
                });
            }

            self.0.open(url)
        }
    }

    let digest = Sha256Digest::compute(&b""[..]).unwrap();
    let manifest = manifest(&digest);

    let transport = BrokenImage(
        FakeTransport::default()
            .with(SIGNATURE_URL, sign(&manifest))
            .with(MANIFEST_URL, manifest),
    );

    let output = tempfile::tempdir().unwrap();
    let events = Events::default();

    let result = download(
        &bionic_desktop(),
        &transport,
        &Reversed,
        &events,
        output.path(),
    );

    assert!(
        matches!(result, Err(Error::Network(HttpError::Read { .. }))),
        "{result:?}"
    );
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    assert_eq!(
        events.log.borrow().last().unwrap(),
        "removed ubuntu-18.04.6-desktop-amd64.iso"
    );
}
