//! Supervisor.
//!
//! Owns the whole run: opens the store, recovers stale leases, ensures the
//! index file, drives the pipeline, launches the workers and finalizes the
//! result file. On SIGINT workers stop after their current snapshot and the
//! metadata survives (`keep` is forced), so the next run resumes.

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use waybackup_cdx::{CdxClient, CdxQuery, IndexFile};
use waybackup_core::{BackupConfig, JobPaths, ProgressSink};
use waybackup_db::{JobRepository, ResultFile, SnapshotRepository, open_store};

use crate::error::EngineError;
use crate::fetch::HttpFetcher;
use crate::pipeline::IndexPipeline;
use crate::queue::WorkQueue;
use crate::worker::{DownloadWorker, WorkerContext};

const RESUME_COUNTDOWN_SECS: u64 = 5;

/// Final counters for the caller's summary output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: i64,
    pub handled: i64,
    pub downloaded: i64,
    pub not_downloaded: i64,
    pub interrupted: bool,
}

/// Orchestrates one backup job from startup to shutdown.
pub struct Supervisor {
    config: Arc<BackupConfig>,
    paths: JobPaths,
    sink: Arc<dyn ProgressSink>,
}

impl Supervisor {
    pub fn new(config: BackupConfig, sink: Arc<dyn ProgressSink>) -> Self {
        let paths = JobPaths::derive(&config);
        Self {
            config: Arc::new(config),
            paths,
            sink,
        }
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    /// Run the job with SIGINT handling installed.
    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let cancel = CancellationToken::new();

        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping after current snapshots");
                    cancel.cancel();
                }
            }
        });

        let result = self.run_with_cancel(cancel).await;
        watcher.abort();
        result
    }

    /// Run the job against an externally controlled cancellation flag.
    pub async fn run_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> Result<RunSummary, EngineError> {
        if self.config.reset {
            self.reset_metadata().await?;
        }
        tokio::fs::create_dir_all(&self.config.output).await?;
        tokio::fs::create_dir_all(&self.config.metadata).await?;

        // 1. open the store and recover stale leases
        let pool = open_store(&self.paths.db_file).await?;
        let jobs = JobRepository::new(pool.clone(), self.config.job_key());
        let snapshots = SnapshotRepository::new(pool.clone());
        snapshots.reset_locks().await?;

        // 2. ensure the job row; 3. resume banner
        let state = jobs.ensure().await?;
        if state.existed {
            info!(
                done = state.progress_done,
                total = state.progress_total,
                "download job exists, resuming (use --reset to start over)"
            );
            for i in (1..=RESUME_COUNTDOWN_SECS).rev() {
                info!("{i}...");
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("aborted before resume");
                        return Ok(RunSummary {
                            interrupted: true,
                            ..RunSummary::default()
                        });
                    }
                    () = sleep(Duration::from_secs(1)) => {}
                }
            }
        }

        // 4. ensure the index file exists
        let index = IndexFile::new(&self.paths.cdx_file);
        if index.exists() {
            info!(path = %index.path().display(), "existing index file found, reusing");
        } else {
            let client = CdxClient::new()?;
            let query = CdxQuery::build(&self.config);
            client
                .fetch_to_file(&query, index.path(), self.sink.as_ref())
                .await?;
            self.sink.finish();
        }

        // 5. pipeline phases A/B/C; 6. prior-result merge
        let result_file = ResultFile::new(&self.paths.csv_file);
        let pipeline = IndexPipeline::new(jobs.clone(), snapshots.clone(), self.config.mode);
        let counts = pipeline.run(&index, &result_file).await?;

        // 7./8. launch workers unless there is nothing left to do
        let mut interrupted = cancel.is_cancelled();
        if counts.unhandled == 0 {
            info!("nothing to download");
        } else if !interrupted {
            info!(
                workers = self.config.workers,
                pending = counts.unhandled,
                "downloading snapshots"
            );
            self.sink.start(counts.total as u64, counts.handled as u64);

            let ctx = WorkerContext {
                config: Arc::clone(&self.config),
                queue: WorkQueue::new(snapshots.clone()),
                repo: snapshots.clone(),
                sink: Arc::clone(&self.sink),
                handled: Arc::new(AtomicI64::new(counts.handled)),
                total: counts.total,
                cancel: cancel.clone(),
            };

            let mut workers = JoinSet::new();
            for id in 1..=self.config.workers.max(1) {
                let fetcher = HttpFetcher::new()?;
                workers.spawn(DownloadWorker::new(id, fetcher, ctx.clone()).run());
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => error!(error = %err, "worker ended with store error"),
                    Err(err) => error!(error = %err, "worker task failed"),
                }
            }
            self.sink.finish();
            interrupted = cancel.is_cancelled();
        }

        // 9. project terminal rows into a fresh result file; rows that
        // never reached a terminal state drop back to pending first
        snapshots.reset_locks().await?;

        let total = snapshots.count_total().await?;
        let handled = snapshots.count_handled().await?;
        let downloaded = snapshots.count_downloaded().await?;
        let not_downloaded = snapshots.count_not_downloaded().await?;
        jobs.write_progress(handled, total).await?;

        result_file.write(&snapshots.export_rows().await?)?;
        info!(downloaded, not_downloaded, "download finished");

        // 10. cleanup, unless the operator (or an interrupt) wants resume
        let keep = self.config.keep || interrupted;
        if keep {
            info!("keeping metadata files");
        } else {
            pool.close().await;
            index.remove().await?;
            if self.paths.db_file.exists() {
                tokio::fs::remove_file(&self.paths.db_file).await?;
            }
        }

        Ok(RunSummary {
            total,
            handled,
            downloaded,
            not_downloaded,
            interrupted,
        })
    }

    async fn reset_metadata(&self) -> Result<(), EngineError> {
        for path in [
            &self.paths.cdx_file,
            &self.paths.db_file,
            &self.paths.csv_file,
        ] {
            if path.exists() {
                tokio::fs::remove_file(path).await?;
            }
        }
        info!("metadata reset, starting fresh");
        Ok(())
    }
}
