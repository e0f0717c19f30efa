//! HTTP fetch abstraction for snapshot downloads.
//!
//! Workers talk to the archive through the [`SnapshotFetcher`] trait so the
//! retry machinery stays testable without a network. The production
//! implementation wraps a reqwest client with redirects disabled; fault
//! classification below drives the two retry levels:
//!
//! - [`FetchFault::Transient`] - socket-level (timeout, refused, reset),
//!   retried on the same connection
//! - [`FetchFault::Protocol`] - HTTP-level, retried once on a fresh
//!   connection
//! - [`FetchFault::Other`] - aborts the attempt

use std::error::Error as _;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use waybackup_cdx::USER_AGENT;

/// Everything the worker needs from one HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    /// `Location` header, when present.
    pub location: Option<String>,
    /// Whether the body arrived with `Content-Encoding: gzip`.
    pub gzip_encoded: bool,
    pub body: Vec<u8>,
}

/// Classified fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFault {
    /// Timeout, connection refused or connection reset.
    Transient(String),
    /// HTTP protocol violation (parse or keep-alive failure).
    Protocol(String),
    /// Anything else.
    Other(String),
}

impl fmt::Display for FetchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient fault: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol fault: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// One kept-alive connection to the archive.
#[async_trait]
pub trait SnapshotFetcher: Send {
    /// Perform a single GET without following redirects.
    async fn fetch(&mut self, url: &str) -> Result<FetchResponse, FetchFault>;

    /// Drop the underlying connection and start a fresh one.
    fn reconnect(&mut self);
}

/// Percent-encode a URL for the request line, preserving `:` and `/`.
pub fn encode_request_url(url: &str) -> String {
    // unreserved characters plus the two kept delimiters
    const KEEP: &AsciiSet = &NON_ALPHANUMERIC
        .remove(b'-')
        .remove(b'_')
        .remove(b'.')
        .remove(b'~')
        .remove(b':')
        .remove(b'/');
    utf8_percent_encode(url, KEEP).to_string()
}

/// Production fetcher over reqwest.
///
/// Each worker owns one of these; the pool is capped at a single idle
/// connection per host so the socket is reused across that worker's
/// requests and never shared.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Self::build_client()?,
        })
    }

    fn build_client() -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(1)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()
    }
}

#[async_trait]
impl SnapshotFetcher for HttpFetcher {
    async fn fetch(&mut self, url: &str) -> Result<FetchResponse, FetchFault> {
        let encoded = encode_request_url(url);

        let response = self
            .client
            .get(&encoded)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let gzip_encoded = response
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        Ok(FetchResponse {
            status,
            location,
            gzip_encoded,
            body,
        })
    }

    fn reconnect(&mut self) {
        // keep the old client if the rebuild fails; the next request will
        // surface the underlying problem
        if let Ok(client) = Self::build_client() {
            self.client = client;
        }
    }
}

/// Map a reqwest error onto the retry taxonomy.
fn classify_reqwest_error(err: reqwest::Error) -> FetchFault {
    if err.is_timeout() || err.is_connect() {
        return FetchFault::Transient(err.to_string());
    }

    // walk the source chain for socket-level resets
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::TimedOut => {
                    return FetchFault::Transient(err.to_string());
                }
                _ => {}
            }
        }
        source = inner.source();
    }

    if err.is_decode() || err.is_body() || err.is_request() {
        return FetchFault::Protocol(err.to_string());
    }

    FetchFault::Other(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_preserves_scheme_and_path_delimiters() {
        assert_eq!(
            encode_request_url("https://web.archive.org/web/20200101000000id_/http://h.example/a"),
            "https://web.archive.org/web/20200101000000id_/http://h.example/a"
        );
    }

    #[test]
    fn encoding_escapes_query_and_spaces() {
        assert_eq!(
            encode_request_url("https://h.example/a b?q=1&x=2"),
            "https://h.example/a%20b%3Fq%3D1%26x%3D2"
        );
    }

    #[test]
    fn encoding_keeps_unreserved_marks() {
        assert_eq!(
            encode_request_url("https://h.example/a-b_c.d~e"),
            "https://h.example/a-b_c.d~e"
        );
    }
}
