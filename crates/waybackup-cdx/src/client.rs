//! Streaming CDX client.
//!
//! Issues the single CDX GET for a job and writes the response verbatim to
//! the index file, reporting byte progress through the sink. A failure here
//! is the one fatal path of the whole startup: the partial index file is
//! removed and the error propagates.

use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use waybackup_core::ProgressSink;

use crate::error::CdxError;
use crate::query::CdxQuery;

/// User-Agent sent on CDX and snapshot requests.
pub const USER_AGENT: &str = concat!(
    "bitdruid-python-wayback-downloader/",
    env!("CARGO_PKG_VERSION")
);

const CDX_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the CDX endpoint.
pub struct CdxClient {
    client: reqwest::Client,
}

impl CdxClient {
    /// Create the client. Fails only on TLS backend initialization.
    pub fn new() -> Result<Self, CdxError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(CDX_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Stream the query result into `index_path`.
    ///
    /// On any error the partially written file is removed before the error
    /// is returned.
    pub async fn fetch_to_file(
        &self,
        query: &CdxQuery,
        index_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<(), CdxError> {
        info!(url = query.as_url(), "querying snapshots");

        match self.stream_response(query, index_path, sink).await {
            Ok(bytes) => {
                info!(bytes, path = %index_path.display(), "index file written");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "could not query cdx server, removing partial index file");
                let _ = tokio::fs::remove_file(index_path).await;
                Err(err)
            }
        }
    }

    async fn stream_response(
        &self,
        query: &CdxQuery,
        index_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<u64, CdxError> {
        let mut response = self.client.get(query.as_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CdxError::QueryFailed {
                status: status.as_u16(),
                url: query.as_url().to_string(),
            });
        }

        let mut file = File::create(index_path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            sink.bytes(chunk.len() as u64);
        }
        file.flush().await?;
        Ok(written)
    }
}
