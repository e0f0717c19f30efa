//! Download worker.
//!
//! One worker per slot, each owning its own kept-alive connection. The loop
//! is `claim → fetch → write → commit` until the queue drains or
//! cancellation is requested. Failures are handled on two levels:
//!
//! - **connection attempts** (inner, up to 3): transient socket faults wait
//!   50 s and reuse the connection; a protocol fault waits 15 s, reopens the
//!   connection and gets one fresh attempt
//! - **snapshot attempts** (outer, `max(retry, 1)`): an attempt that ends
//!   without success waits 15 s before the next one, when one remains
//!
//! Unexpected errors abort the snapshot; the error lands in the run log and
//! the row keeps whatever state was recorded so far.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

use waybackup_core::{
    BackupConfig, NT_PATH_SENTINEL, ProgressSink, SnapshotRecord, SnapshotUpdate,
    url_get_timestamp,
};
use waybackup_db::{SnapshotRepository, StoreError};

use crate::error::EngineError;
use crate::fetch::{FetchFault, FetchResponse, SnapshotFetcher};
use crate::paths::{output_path, path_too_long, prepare_target};
use crate::queue::WorkQueue;

const MAX_CONNECTION_ATTEMPTS: u32 = 3;
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(50);
const PROTOCOL_BACKOFF: Duration = Duration::from_secs(15);
const OUTER_RETRY_WAIT: Duration = Duration::from_secs(15);
const REDIRECT_HOP_LIMIT: u32 = 5;

/// Shared pieces every worker runs against.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<BackupConfig>,
    pub queue: WorkQueue,
    pub repo: SnapshotRepository,
    pub sink: Arc<dyn ProgressSink>,
    /// Snapshots with a terminal outcome so far, across all workers.
    pub handled: Arc<AtomicI64>,
    /// Fixed after filtering; never recomputed while workers run.
    pub total: i64,
    pub cancel: CancellationToken,
}

/// How one outer attempt ended.
enum AttemptOutcome {
    Success,
    Failed,
    /// Unexpected error; no further attempts for this snapshot.
    Aborted,
}

/// Internal fault channel: store errors propagate, fetch faults feed the
/// retry machinery.
enum WorkerFault {
    Fetch(FetchFault),
    Store(StoreError),
}

impl From<StoreError> for WorkerFault {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// A single download slot.
pub struct DownloadWorker<F: SnapshotFetcher> {
    id: u32,
    fetcher: F,
    ctx: WorkerContext,
}

impl<F: SnapshotFetcher> DownloadWorker<F> {
    pub fn new(id: u32, fetcher: F, ctx: WorkerContext) -> Self {
        Self { id, fetcher, ctx }
    }

    /// Claim and process snapshots until the queue drains or cancellation
    /// is requested. Store errors end the worker; the leased row stays
    /// `LOCK` until the next startup resets it.
    pub async fn run(mut self) -> Result<(), EngineError> {
        debug!(worker = self.id, "worker started");

        loop {
            if self.ctx.cancel.is_cancelled() {
                debug!(worker = self.id, "stop requested, ending after current snapshot");
                return Ok(());
            }

            let Some(snapshot) = self.ctx.queue.claim().await? else {
                debug!(worker = self.id, "queue drained");
                return Ok(());
            };

            self.process(&snapshot).await?;

            let done = self.ctx.handled.fetch_add(1, Ordering::Relaxed) + 1;
            self.ctx.sink.tick();
            debug!(
                worker = self.id,
                done,
                total = self.ctx.total,
                url = %snapshot.url_origin,
                "snapshot handled"
            );

            if self.ctx.config.delay_secs > 0 {
                tokio::select! {
                    () = self.ctx.cancel.cancelled() => {}
                    () = sleep(Duration::from_secs(self.ctx.config.delay_secs)) => {}
                }
            }
        }
    }

    /// Outer retry loop for one snapshot.
    async fn process(&mut self, snapshot: &SnapshotRecord) -> Result<(), EngineError> {
        let max_attempts = self.ctx.config.retry.max(1);
        let mut attempt = 1;

        while attempt <= max_attempts {
            debug!(
                worker = self.id,
                attempt,
                max_attempts,
                counter = snapshot.counter,
                "starting attempt"
            );

            match self.attempt_download(snapshot).await? {
                AttemptOutcome::Success => return Ok(()),
                AttemptOutcome::Aborted => return Ok(()),
                AttemptOutcome::Failed => {
                    if attempt < max_attempts {
                        debug!(worker = self.id, "download failed, retrying in 15 seconds");
                        sleep(OUTER_RETRY_WAIT).await;
                    } else {
                        debug!(worker = self.id, "download failed, no attempt left");
                    }
                }
            }
            attempt += 1;
        }

        Ok(())
    }

    /// Inner connection loop for one outer attempt.
    async fn attempt_download(
        &mut self,
        snapshot: &SnapshotRecord,
    ) -> Result<AttemptOutcome, EngineError> {
        let mut connection_attempt = 1;

        while connection_attempt <= MAX_CONNECTION_ATTEMPTS {
            match self.download(snapshot).await {
                Ok(true) => return Ok(AttemptOutcome::Success),
                Ok(false) => return Ok(AttemptOutcome::Failed),
                Err(WorkerFault::Store(err)) => return Err(err.into()),
                Err(WorkerFault::Fetch(FetchFault::Transient(msg))) => {
                    if connection_attempt < MAX_CONNECTION_ATTEMPTS {
                        connection_attempt += 1;
                        warn!(
                            worker = self.id,
                            error = %msg,
                            "transient fault, requesting again in 50 seconds"
                        );
                        sleep(TRANSIENT_BACKOFF).await;
                        continue;
                    }
                    return Ok(AttemptOutcome::Failed);
                }
                Err(WorkerFault::Fetch(FetchFault::Protocol(msg))) => {
                    if connection_attempt < MAX_CONNECTION_ATTEMPTS {
                        // one fresh-connection attempt
                        connection_attempt = MAX_CONNECTION_ATTEMPTS;
                        warn!(
                            worker = self.id,
                            error = %msg,
                            "protocol fault, renewing connection in 15 seconds"
                        );
                        sleep(PROTOCOL_BACKOFF).await;
                        self.fetcher.reconnect();
                        continue;
                    }
                    return Ok(AttemptOutcome::Failed);
                }
                Err(WorkerFault::Fetch(FetchFault::Other(msg))) => {
                    error!(
                        worker = self.id,
                        url = %snapshot.url_archive,
                        error = %msg,
                        "unexpected download error"
                    );
                    return Ok(AttemptOutcome::Aborted);
                }
            }
        }

        Ok(AttemptOutcome::Failed)
    }

    /// Single fetch procedure: request, redirect chain, status dispatch,
    /// collision-safe write, terminal commit.
    async fn download(&mut self, snapshot: &SnapshotRecord) -> Result<bool, WorkerFault> {
        let mut update = SnapshotUpdate::default();

        let mut response = self
            .fetcher
            .fetch(&snapshot.url_archive)
            .await
            .map_err(WorkerFault::Fetch)?;
        self.ctx
            .repo
            .set_response(snapshot.scid, &response.status.to_string())
            .await?;

        if !self.ctx.config.no_redirect && response.status == 302 {
            response = self.follow_redirects(snapshot, response).await?;
        }
        update.response = Some(response.status.to_string());

        let success = if response.status == 200 {
            self.store_body(snapshot, &response, &mut update).await?
        } else {
            debug!(
                worker = self.id,
                status = response.status,
                url = %snapshot.url_archive,
                "unexpected response"
            );
            false
        };

        self.ctx.queue.commit(snapshot.scid, &update).await?;
        Ok(success)
    }

    /// Follow up to five redirect hops, tracing each one onto the row.
    async fn follow_redirects(
        &mut self,
        snapshot: &SnapshotRecord,
        first: FetchResponse,
    ) -> Result<FetchResponse, WorkerFault> {
        debug!(
            worker = self.id,
            status = first.status,
            from = %snapshot.url_archive,
            "redirect"
        );

        let mut response = first;
        let mut current_url = snapshot.url_archive.clone();

        for _ in 0..REDIRECT_HOP_LIMIT {
            response = self
                .fetcher
                .fetch(&current_url)
                .await
                .map_err(WorkerFault::Fetch)?;

            let Some(location) = response.location.clone() else {
                break;
            };

            let prior = current_url.clone();
            let redirect_timestamp = url_get_timestamp(&location);
            current_url = resolve_location(&prior, &location);

            debug!(worker = self.id, to = %location, "redirect");
            self.ctx
                .repo
                .set_redirect(snapshot.scid, &prior, redirect_timestamp.as_deref())
                .await?;
        }

        Ok(response)
    }

    /// Write the body under the collision-safe rules and record the file.
    async fn store_body(
        &mut self,
        snapshot: &SnapshotRecord,
        response: &FetchResponse,
        update: &mut SnapshotUpdate,
    ) -> Result<bool, WorkerFault> {
        let output_file = output_path(
            &self.ctx.config.output,
            self.ctx.config.mode,
            &snapshot.url_archive,
            &snapshot.timestamp,
        );

        if path_too_long(&output_file) {
            warn!(
                worker = self.id,
                url = %snapshot.url_archive,
                "cannot save, path exceeds the NT limit"
            );
            update.file = Some(NT_PATH_SENTINEL.to_string());
            return Ok(false);
        }

        let body = if response.gzip_encoded {
            gunzip(&response.body).map_err(|err| {
                WorkerFault::Fetch(FetchFault::Other(format!("gzip decode failed: {err}")))
            })?
        } else {
            response.body.clone()
        };

        let target = prepare_target(&output_file, &body)
            .map_err(|err| WorkerFault::Fetch(FetchFault::Other(err.to_string())))?;

        if target.is_file() {
            debug!(worker = self.id, file = %target.display(), "existing, not overwritten");
        } else {
            tokio::fs::write(&target, &body)
                .await
                .map_err(|err| WorkerFault::Fetch(FetchFault::Other(err.to_string())))?;
            debug!(worker = self.id, file = %target.display(), "success");
        }

        update.file = Some(target.to_string_lossy().into_owned());
        Ok(true)
    }
}

/// Resolve a `Location` header against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(location)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => location.to_string(),
    }
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
