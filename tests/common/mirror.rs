use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tiny_http::{Request, Response, Server};
use ubuntu_iso_download::{Authenticator, SignatureError};

/// Files served by a [`Mirror`], and the log of requested paths.
#[derive(Default)]
pub struct Tree {
    files: HashMap<String, Vec<u8>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Tree {
    pub fn file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_owned(), data.into());
        self
    }

    /// Add a `SHA256SUMS` manifest in `dir`, with its signature.
    pub fn signed_manifest(self, dir: &str, manifest: &str) -> Self {
        self.file(&format!("{dir}/SHA256SUMS"), manifest)
            .file(&format!("{dir}/SHA256SUMS.gpg"), sign(manifest.as_bytes()))
    }
}

/// HTTP server mimicking a mirror of `releases.ubuntu.com`.
pub struct Mirror {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Mirror {
    /// Start a server in a random port.
    pub fn start(tree: Tree) -> Mirror {
        let server = Server::http("127.1:0").expect("start mirror server");
        let port = server.server_addr().to_ip().unwrap().port();

        let requests = Arc::clone(&tree.requests);

        std::thread::spawn(move || {
            let timeout = Duration::from_secs(30);
            while let Ok(Some(request)) = server.recv_timeout(timeout) {
                handle(&tree, request);
            }
        });

        Mirror {
            url: format!("http://127.0.0.1:{port}/ubuntu-releases"),
            requests,
        }
    }

    pub fn requested(&self, path: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|p| p == path)
    }
}

fn handle(tree: &Tree, request: Request) {
    let path = request.url().to_owned();
    tree.requests.lock().unwrap().push(path.clone());

    let response = path
        .strip_prefix("/ubuntu-releases")
        .and_then(|p| tree.files.get(p))
        .map(|data| Response::from_data(data.clone()).with_chunked_threshold(usize::MAX))
        .unwrap_or_else(|| Response::from_string("Not Found").with_status_code(404));

    request.respond(response).expect("Send response");
}

/// Authenticator that accepts signatures made with [`sign`].
pub struct TestKey;

impl Authenticator for TestKey {
    fn authenticate(&self, data: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        if sign(data) == signature {
            Ok(())
        } else {
            Err(SignatureError::Invalid("TEST".into()))
        }
    }
}

pub fn sign(data: &[u8]) -> Vec<u8> {
    let mut signature = b"signed:".to_vec();
    signature.extend_from_slice(data);
    signature
}
