
use std::{
    io::{self, Read},
    time::Duration,
};

use crate::EventHandler;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Maximum size for the responses read in memory (manifests, signatures,
/// release metadata).
const MAX_BODY_LEN: u64 = 16 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const READ_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("{0}")]
    Transport(#[from] Box<ureq::Error>),

    #[error("{url} responded with HTTP {code}")]
    Status { url: String, code: u16 },

    #[error("Failed to read the response from {url}: {source}")]
    Read { url: String, source: io::Error },

    #[error("Response from {0} is too large.")]
    TooLarge(String),
}

impl From<ureq::Error> for HttpError {
    fn from(value: ureq::Error) -> Self {
        match value {
            ureq::Error::Status(code, response) => HttpError::Status {
                url: response.get_url().to_owned(),
                code,
            },

            e => HttpError::Transport(Box::new(e)),
        }
    }
}

/// Body of a response, received as a stream.
pub struct Stream {
    /// Value of the `Content-Length` header, if any.
    pub content_length: Option<u64>,

    pub body: Box<dyn Read + Send>,
}

/// Performs `GET` requests.
///
/// Only [`open`](Transport::open) is required. The default implementation
/// of [`get`](Transport::get) reads the stream in memory.
pub trait Transport {
    /// Send a `GET` request, and return the body as a stream.
    ///
    /// Responses with a non-2xx status must be reported as
    /// [`HttpError::Status`].
    fn open(&self, url: &str) -> Result<Stream, HttpError>;

    /// Send a `GET` request, and return the full body.
    ///
    /// It is intended for small payloads, like a checksum manifest or a
    /// signature. Bodies larger than 16 MiB are rejected.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let Stream { body, .. } = self.open(url)?;

        let mut data = Vec::new();
        body.take(MAX_BODY_LEN + 1)
            .read_to_end(&mut data)
            .map_err(|source| HttpError::Read {
                url: url.to_owned(),
                source,
            })?;

        if data.len() as u64 > MAX_BODY_LEN {
            return Err(HttpError::TooLarge(url.to_owned()));
        }

        Ok(data)
    }
}

/// HTTP client backed by `ureq`.
pub struct Client<'a, E> {
    event_handler: &'a E,
    agent: ureq::Agent,
}

impl<'a, E> Client<'a, E>
where
    E: EventHandler,
{
    /// Create a new HTTP client.
    ///
    /// Every request is reported to `event_handler` before it is sent.
    pub fn new(event_handler: &'a E) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();

        Client {
            event_handler,
            agent,
        }
    }
}

impl<E: EventHandler> Transport for Client<'_, E> {
    fn open(&self, url: &str) -> Result<Stream, HttpError> {
        self.event_handler.http_request(url);

        let response = self.agent.get(url).call()?;

        let content_length = response
            .header("Content-Length")
            .and_then(|h| h.trim().parse().ok());

        Ok(Stream {
            content_length,
            body: Box::new(response.into_reader()),
        })
    }
}
