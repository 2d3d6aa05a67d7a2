//! Authenticate a checksum manifest, and extract the expected digest.

use crate::{
    checksums::{self, ManifestEntry, Selector},
    http::{HttpError, Transport},
    signature::{Authenticator, SignatureError},
    EventHandler,
};

#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    #[error("{0}")]
    Http(#[from] HttpError),

    #[error("GPG signature verification failed for {url}: {source}")]
    Signature { url: String, source: SignatureError },
}

/// Download the manifest in `manifest_url`, check its detached signature
/// in `signed_manifest_url`, and find the entry matched by `selector`.
///
/// The manifest is not parsed unless the signature is valid.
///
/// Returns `Ok(None)` if no entry matches the selector. The caller must
/// not use any other digest in that case.
pub fn verify_and_extract<E: EventHandler>(
    transport: &impl Transport,
    authenticator: &impl Authenticator,
    event_handler: &E,
    manifest_url: &str,
    signed_manifest_url: &str,
    selector: &Selector,
) -> Result<Option<ManifestEntry>, VerifyError> {
    let manifest = transport.get(manifest_url)?;
    let signature = transport.get(signed_manifest_url)?;

    authenticator
        .authenticate(&manifest, &signature)
        .map_err(|source| VerifyError::Signature {
            url: signed_manifest_url.to_owned(),
            source,
        })?;

    event_handler.signature_verified(manifest_url);

    let entry = checksums::select(&String::from_utf8_lossy(&manifest), selector);

    match &entry {
        Some(entry) => event_handler.checksum_selected(entry),
        None => event_handler.checksum_not_found(manifest_url),
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        http::tests::FakeTransport,
        signature::testing::{sign, Reversed},
        variant::MediaClass,
        Architecture,
    };

    const MANIFEST_URL: &str = "https://example.com/18.04/SHA256SUMS";
    const SIGNATURE_URL: &str = "https://example.com/18.04/SHA256SUMS.gpg";

    const MANIFEST: &str = "\
1111111111111111111111111111111111111111111111111111111111111111 *ubuntu-18.04.5-desktop-amd64.iso
2222222222222222222222222222222222222222222222222222222222222222 *ubuntu-18.04.5-live-server-amd64.iso
3333333333333333333333333333333333333333333333333333333333333333 *ubuntu-18.04.6-desktop-amd64.iso
";

    #[derive(Default)]
    struct Events(RefCell<Vec<String>>);

    impl EventHandler for Events {
        fn signature_verified(&self, manifest_url: &str) {
            self.0.borrow_mut().push(format!("verified {manifest_url}"));
        }

        fn checksum_selected(&self, entry: &ManifestEntry) {
            self.0.borrow_mut().push(format!("selected {}", entry.filename));
        }

        fn checksum_not_found(&self, manifest_url: &str) {
            self.0.borrow_mut().push(format!("not found {manifest_url}"));
        }
    }

    fn desktop() -> Selector {
        Selector::SubstringPair {
            class: MediaClass::Desktop,
            arch: Architecture::Amd64,
        }
    }

    #[test]
    fn extract_latest_entry() {
        let transport = FakeTransport::default()
            .with(MANIFEST_URL, MANIFEST)
            .with(SIGNATURE_URL, sign(MANIFEST));

        let events = Events::default();

        let entry = verify_and_extract(
            &transport,
            &Reversed,
            &events,
            MANIFEST_URL,
            SIGNATURE_URL,
            &desktop(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(entry.filename, "ubuntu-18.04.6-desktop-amd64.iso");
        assert_eq!(entry.digest.as_str(), &"3".repeat(64));

        assert_eq!(
            *events.0.borrow(),
            [
                format!("verified {MANIFEST_URL}"),
                "selected ubuntu-18.04.6-desktop-amd64.iso".to_owned(),
            ]
        );
    }

    #[test]
    fn no_matching_entry() {
        let transport = FakeTransport::default()
            .with(MANIFEST_URL, MANIFEST)
            .with(SIGNATURE_URL, sign(MANIFEST));

        let events = Events::default();

        let selector = Selector::ExactFilename("bionic-desktop-arm64.iso".into());
        let entry = verify_and_extract(
            &transport,
            &Reversed,
            &events,
            MANIFEST_URL,
            SIGNATURE_URL,
            &selector,
        )
        .unwrap();

        assert_eq!(entry, None);
        assert_eq!(events.0.borrow().last().unwrap(), &format!("not found {MANIFEST_URL}"));
    }

    #[test]
    fn invalid_signature() {
        let transport = FakeTransport::default()
            .with(MANIFEST_URL, MANIFEST)
            .with(SIGNATURE_URL, &b"bogus"[..]);

        let events = Events::default();

        let result = verify_and_extract(
            &transport,
            &Reversed,
            &events,
            MANIFEST_URL,
            SIGNATURE_URL,
            &desktop(),
        );

        match result {
            Err(VerifyError::Signature { url, .. }) => assert_eq!(url, SIGNATURE_URL),
            r => panic!("Unexpected result: {r:?}"),
        }

        // The manifest is not used.
        assert!(events.0.borrow().is_empty());
    }

    #[test]
    fn missing_signature() {
        let transport = FakeTransport::default().with(MANIFEST_URL, MANIFEST);

        let result = verify_and_extract(
            &transport,
            &Reversed,
            &crate::NoEventHandler,
            MANIFEST_URL,
            SIGNATURE_URL,
            &desktop(),
        );

        assert!(matches!(
            result,
            Err(VerifyError::Http(HttpError::Status { code: 404, .. }))
        ));
    }
}
