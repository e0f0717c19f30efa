//! Index pipeline.
//!
//! Three strictly ordered phases, each guarded by a job latch so a resumed
//! run skips whatever already completed:
//!
//! - **Insert**: parse the index file line by line and batch-insert rows,
//!   pre-marking statuscodes that can never yield content
//! - **Index**: create the secondary indexes phase C needs
//! - **Filter**: prune rows per origin URL according to the mode, then
//!   assign the dense display counters
//!
//! After phase C a prior result file, when present, overwrites matching
//! rows with their known terminal state; that file is the authoritative
//! history when the database was lost between runs.

use tracing::{debug, info};

use waybackup_cdx::IndexFile;
use waybackup_core::{Mode, NewSnapshot};
use waybackup_db::{JobRepository, ResultFile, SnapshotRepository};

use crate::error::EngineError;

const INSERT_BATCH: usize = 2_500;
const COUNTER_BATCH: usize = 5_000;
const MERGE_BATCH: usize = 2_500;

/// Totals gathered while the pipeline runs, for the final calculation
/// report and the supervisor's decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineCounts {
    /// Data rows in the index file.
    pub cdx_total: u64,
    /// Malformed index lines skipped during insert.
    pub faulty: u64,
    /// Rows dropped by the unique `url_archive` constraint.
    pub duplicates: u64,
    /// Rows pruned by the mode filter.
    pub filter_mode: u64,
    /// Rows overwritten from the prior result file.
    pub filter_skip: u64,
    /// Rows pre-marked because their statuscode was 301 or 404.
    pub status_filtered: i64,
    /// Rows in the table after all phases.
    pub total: i64,
    /// Rows already carrying a terminal state.
    pub handled: i64,
    /// Rows still pending.
    pub unhandled: i64,
}

/// The three-phase ingest from index file to work set.
pub struct IndexPipeline {
    jobs: JobRepository,
    snapshots: SnapshotRepository,
    mode: Mode,
}

impl IndexPipeline {
    pub fn new(jobs: JobRepository, snapshots: SnapshotRepository, mode: Mode) -> Self {
        Self {
            jobs,
            snapshots,
            mode,
        }
    }

    /// Run all phases idempotently and merge the prior result file.
    pub async fn run(
        &self,
        index: &IndexFile,
        result: &ResultFile,
    ) -> Result<PipelineCounts, EngineError> {
        let mut counts = PipelineCounts {
            cdx_total: index.count_rows().await?,
            ..PipelineCounts::default()
        };

        let (insert_done, index_done, filter_done) = self.jobs.latches().await?;

        if insert_done {
            info!("index data already inserted into store");
        } else {
            info!("inserting index data into store");
            counts.faulty = self.insert_phase(index).await?;
            let inserted = self.snapshots.count_total().await?;
            counts.duplicates = counts
                .cdx_total
                .saturating_sub(counts.faulty)
                .saturating_sub(inserted as u64);
            self.jobs.set_insert_done().await?;
        }

        if index_done {
            info!("snapshots already indexed");
        } else {
            info!("indexing snapshots");
            self.snapshots.create_mode_indexes(self.mode).await?;
            self.jobs.set_index_done().await?;
        }

        if filter_done {
            info!("snapshots already filtered and enumerated");
        } else {
            if self.mode.filters() {
                info!(mode = %self.mode, "filtering snapshots");
                counts.filter_mode = self.snapshots.filter_to_mode(self.mode).await?;
            }
            self.snapshots.assign_counters(COUNTER_BATCH).await?;
            self.jobs.set_filter_done().await?;
        }

        if result.exists() {
            let prior = result.read()?;
            counts.filter_skip = self.snapshots.merge_prior(&prior, MERGE_BATCH).await?;
        }

        counts.status_filtered = self.snapshots.count_status_filtered().await?;
        counts.total = self.snapshots.count_total().await?;
        counts.handled = self.snapshots.count_handled().await?;
        counts.unhandled = self.snapshots.count_unhandled().await?;

        self.report(&counts);
        Ok(counts)
    }

    /// Phase A: stream the index file into the snapshot table.
    ///
    /// The first line is the header and is dropped. Malformed lines are
    /// counted, never fatal. Returns the number of faulty lines.
    async fn insert_phase(&self, index: &IndexFile) -> Result<u64, EngineError> {
        let mut lines = index.lines().await?;
        let mut batch: Vec<NewSnapshot> = Vec::with_capacity(INSERT_BATCH);
        let mut faulty: u64 = 0;
        let mut header = true;

        while let Some(line) = lines.next_line().await? {
            if header {
                header = false;
                continue;
            }

            match waybackup_cdx::parse_cdx_line(&line) {
                Ok(row) => {
                    batch.push(NewSnapshot::from_cdx(
                        row.timestamp,
                        row.original,
                        &row.statuscode,
                    ));
                    if batch.len() >= INSERT_BATCH {
                        self.snapshots.insert_batch(&batch).await?;
                        batch.clear();
                    }
                }
                Err(err) => {
                    faulty += 1;
                    debug!(error = %err, "skipping malformed cdx line");
                }
            }
        }

        if !batch.is_empty() {
            self.snapshots.insert_batch(&batch).await?;
        }

        Ok(faulty)
    }

    fn report(&self, counts: &PipelineCounts) {
        info!(in_cdx_file = counts.cdx_total, "snapshot calculation");
        if counts.faulty > 0 {
            info!(removed_faulty = counts.faulty, "snapshot calculation");
        }
        if counts.duplicates > 0 {
            info!(removed_duplicates = counts.duplicates, "snapshot calculation");
        }
        if counts.filter_mode > 0 {
            info!(removed_versions = counts.filter_mode, "snapshot calculation");
        }
        if counts.filter_skip > 0 {
            info!(merged_prior = counts.filter_skip, "snapshot calculation");
        }
        if counts.status_filtered > 0 {
            info!(
                filtered_by_status = counts.status_filtered,
                "snapshot calculation"
            );
        }
        info!(to_utilize = counts.unhandled, "snapshot calculation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waybackup_core::PriorResult;
    use waybackup_db::open_test_store;

    async fn write_index(dir: &std::path::Path, lines: &[&str]) -> IndexFile {
        let path = dir.join("job.cdx");
        let mut content = String::from(
            "[[\"timestamp\",\"digest\",\"mimetype\",\"statuscode\",\"original\"],\n",
        );
        content.push_str(&lines.join("\n"));
        tokio::fs::write(&path, content).await.unwrap();
        IndexFile::new(path)
    }

    fn data_line(ts: &str, status: &str, original: &str) -> String {
        format!("[\"{ts}\", \"DIGEST\", \"text/html\", \"{status}\", \"{original}\"],")
    }

    async fn pipeline(pool: &waybackup_db::SqlitePool, mode: Mode) -> IndexPipeline {
        let jobs = JobRepository::new(pool.clone(), "test-key");
        jobs.ensure().await.unwrap();
        IndexPipeline::new(jobs, SnapshotRepository::new(pool.clone()), mode)
    }

    #[tokio::test]
    async fn full_run_inserts_filters_and_enumerates() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_test_store().await.unwrap();

        let lines = [
            data_line("20200101000000", "200", "http://h.example/a"),
            data_line("20210101000000", "200", "http://h.example/a"),
            data_line("20200101000000", "200", "http://h.example/b"),
            data_line("20200102000000", "404", "http://h.example/gone"),
            "not a json line,".to_string(),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let index = write_index(dir.path(), &refs).await;
        let result = ResultFile::new(dir.path().join("job.csv"));

        let p = pipeline(&pool, Mode::Last).await;
        let counts = p.run(&index, &result).await.unwrap();

        assert_eq!(counts.cdx_total, 5);
        assert_eq!(counts.faulty, 1);
        assert_eq!(counts.duplicates, 0);
        assert_eq!(counts.filter_mode, 1);
        assert_eq!(counts.status_filtered, 1);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.handled, 1);
        assert_eq!(counts.unhandled, 2);

        // counters are dense 1..N after phase C
        let repo = SnapshotRepository::new(pool);
        let mut counters: Vec<i64> = repo
            .all_rows()
            .await
            .unwrap()
            .iter()
            .map(|r| r.counter.unwrap())
            .collect();
        counters.sort_unstable();
        assert_eq!(counters, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn second_run_visits_no_additional_work() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_test_store().await.unwrap();

        let lines = [
            data_line("20200101000000", "200", "http://h.example/a"),
            data_line("20210101000000", "200", "http://h.example/a"),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let index = write_index(dir.path(), &refs).await;
        let result = ResultFile::new(dir.path().join("job.csv"));

        let p = pipeline(&pool, Mode::Last).await;
        let first = p.run(&index, &result).await.unwrap();
        assert_eq!(first.total, 1);

        // same pipeline again over an intact store: latches skip every
        // phase, the work set is unchanged
        let second = p.run(&index, &result).await.unwrap();
        assert_eq!(second.total, 1);
        assert_eq!(second.unhandled, first.unhandled);
        assert_eq!(second.filter_mode, 0);
        assert_eq!(second.faulty, 0);
    }

    #[tokio::test]
    async fn prior_result_file_overwrites_terminal_columns() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_test_store().await.unwrap();

        let lines = [
            data_line("20200101000000", "200", "http://h.example/a"),
            data_line("20200102000000", "200", "http://h.example/b"),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let index = write_index(dir.path(), &refs).await;

        let result = ResultFile::new(dir.path().join("job.csv"));
        result
            .write(&[PriorResult {
                timestamp: "20200101000000".to_string(),
                url_archive: waybackup_core::archive_url(
                    "20200101000000",
                    "http://h.example/a",
                ),
                url_origin: "http://h.example/a".to_string(),
                redirect_url: None,
                redirect_timestamp: None,
                response: Some("200".to_string()),
                file: Some("/out/h.example/a".to_string()),
            }])
            .unwrap();

        let p = pipeline(&pool, Mode::All).await;
        let counts = p.run(&index, &result).await.unwrap();

        assert_eq!(counts.filter_skip, 1);
        assert_eq!(counts.handled, 1);
        assert_eq!(counts.unhandled, 1);

        let repo = SnapshotRepository::new(pool);
        let rows = repo.all_rows().await.unwrap();
        let merged = rows
            .iter()
            .find(|r| r.url_origin == "http://h.example/a")
            .unwrap();
        assert_eq!(merged.response.as_deref(), Some("200"));
        assert_eq!(merged.file.as_deref(), Some("/out/h.example/a"));
    }

    #[tokio::test]
    async fn duplicates_are_counted_against_the_cdx_total() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_test_store().await.unwrap();

        let lines = [
            data_line("20200101000000", "200", "http://h.example/a"),
            data_line("20200101000000", "200", "http://h.example/a"),
            data_line("20200101000000", "200", "http://h.example/a"),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let index = write_index(dir.path(), &refs).await;
        let result = ResultFile::new(dir.path().join("job.csv"));

        let p = pipeline(&pool, Mode::All).await;
        let counts = p.run(&index, &result).await.unwrap();

        assert_eq!(counts.cdx_total, 3);
        assert_eq!(counts.duplicates, 2);
        assert_eq!(counts.total, 1);
    }
}
