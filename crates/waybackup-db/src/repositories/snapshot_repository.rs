//! Snapshot table access.
//!
//! The snapshot table is both the parsed index and the work queue. Pipeline
//! phases insert/index/filter it in bulk; workers claim single rows by
//! flipping `response` to `LOCK` and write terminal state back.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use waybackup_core::{Mode, NewSnapshot, PriorResult, RESPONSE_LOCK, SnapshotRecord, SnapshotUpdate};

use crate::error::StoreError;
use crate::repositories::row_mappers::{row_to_result, row_to_snapshot};

/// Access to the snapshot table.
#[derive(Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
}

impl SnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Pipeline bulk operations
    // ------------------------------------------------------------------

    /// Insert one batch of parsed CDX rows under a single transaction.
    ///
    /// Duplicate `url_archive` values are dropped silently (conflict-ignore).
    pub async fn insert_batch(&self, batch: &[NewSnapshot]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for row in batch {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO snapshots (timestamp, url_archive, url_origin, response)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&row.timestamp)
            .bind(&row.url_archive)
            .bind(&row.url_origin)
            .bind(&row.response)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = batch.len(), "inserted snapshot batch");
        Ok(())
    }

    /// Create the secondary indexes the mode filter and the prior-state
    /// merge rely on.
    pub async fn create_mode_indexes(&self, mode: Mode) -> Result<(), StoreError> {
        match mode {
            Mode::Last => {
                sqlx::query(
                    "CREATE INDEX IF NOT EXISTS idx_snapshots_origin_ts_desc \
                     ON snapshots(url_origin, timestamp DESC)",
                )
                .execute(&self.pool)
                .await?;
            }
            Mode::First => {
                sqlx::query(
                    "CREATE INDEX IF NOT EXISTS idx_snapshots_origin_ts_asc \
                     ON snapshots(url_origin, timestamp ASC)",
                )
                .execute(&self.pool)
                .await?;
            }
            Mode::All => {}
        }

        // lookup index for the result-file merge
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_snapshots_ts_origin \
             ON snapshots(timestamp, url_origin)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Keep one row per origin URL: the newest for `last`, the oldest for
    /// `first`. Returns the number of pruned rows. No-op in `all` mode.
    pub async fn filter_to_mode(&self, mode: Mode) -> Result<u64, StoreError> {
        let ordering = match mode {
            Mode::Last => "DESC",
            Mode::First => "ASC",
            Mode::All => return Ok(0),
        };

        let query = format!(
            r#"
            DELETE FROM snapshots
            WHERE scid IN (
                SELECT scid FROM (
                    SELECT scid,
                        ROW_NUMBER() OVER (PARTITION BY url_origin ORDER BY timestamp {ordering}) AS ranking
                    FROM snapshots
                ) ranked
                WHERE ranking > 1
            )
            "#
        );

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Assign the dense 1..N display sequence in stable `scid` order,
    /// `batch_size` rows per transaction.
    pub async fn assign_counters(&self, batch_size: usize) -> Result<u64, StoreError> {
        let scids: Vec<i64> = sqlx::query_scalar("SELECT scid FROM snapshots ORDER BY scid")
            .fetch_all(&self.pool)
            .await?;

        let mut counter: i64 = 0;
        for chunk in scids.chunks(batch_size.max(1)) {
            let mut tx = self.pool.begin().await?;
            for scid in chunk {
                counter += 1;
                sqlx::query("UPDATE snapshots SET counter = ? WHERE scid = ?")
                    .bind(counter)
                    .bind(scid)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
        }

        Ok(counter as u64)
    }

    /// Overwrite matching rows with the terminal columns of a prior run.
    ///
    /// Rows are matched on `(timestamp, url_origin)`; unmatched prior rows
    /// are ignored. Returns the number of rows updated.
    pub async fn merge_prior(
        &self,
        rows: &[PriorResult],
        batch_size: usize,
    ) -> Result<u64, StoreError> {
        let mut updated = 0;
        for chunk in rows.chunks(batch_size.max(1)) {
            let mut tx = self.pool.begin().await?;
            for row in chunk {
                let result = sqlx::query(
                    r#"
                    UPDATE snapshots SET
                        url_archive = ?,
                        redirect_url = ?,
                        redirect_timestamp = ?,
                        response = ?,
                        file = ?
                    WHERE timestamp = ? AND url_origin = ?
                    "#,
                )
                .bind(&row.url_archive)
                .bind(&row.redirect_url)
                .bind(&row.redirect_timestamp)
                .bind(&row.response)
                .bind(&row.file)
                .bind(&row.timestamp)
                .bind(&row.url_origin)
                .execute(&mut *tx)
                .await?;
                updated += result.rows_affected();
            }
            tx.commit().await?;
        }
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Work-queue operations
    // ------------------------------------------------------------------

    /// Reset leftover leases from a crashed or interrupted run.
    pub async fn reset_locks(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE snapshots SET response = NULL WHERE response = ?")
            .bind(RESPONSE_LOCK)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Atomically lease the lowest-`scid` pending row.
    ///
    /// SQLite has no `SKIP LOCKED`; callers serialize this statement behind
    /// a process-wide mutex (see the work queue in `waybackup-download`).
    pub async fn claim_next(&self) -> Result<Option<SnapshotRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE snapshots
            SET response = ?
            WHERE scid = (
                SELECT scid FROM snapshots
                WHERE response IS NULL
                ORDER BY scid
                LIMIT 1
            )
            RETURNING scid, counter, timestamp, url_archive, url_origin,
                      redirect_url, redirect_timestamp, response, file
            "#,
        )
        .bind(RESPONSE_LOCK)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_snapshot).transpose().map_err(Into::into)
    }

    /// Commit bound columns for a claimed row. `None` fields keep whatever
    /// the row already holds.
    pub async fn commit(&self, scid: i64, update: &SnapshotUpdate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE snapshots SET
                redirect_url = COALESCE(?, redirect_url),
                redirect_timestamp = COALESCE(?, redirect_timestamp),
                response = COALESCE(?, response),
                file = COALESCE(?, file)
            WHERE scid = ?
            "#,
        )
        .bind(&update.redirect_url)
        .bind(&update.redirect_timestamp)
        .bind(&update.response)
        .bind(&update.file)
        .bind(scid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the observed HTTP status for a leased row.
    pub async fn set_response(&self, scid: i64, response: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE snapshots SET response = ? WHERE scid = ?")
            .bind(response)
            .bind(scid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record one hop of a redirect chain.
    pub async fn set_redirect(
        &self,
        scid: i64,
        redirect_url: &str,
        redirect_timestamp: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE snapshots SET redirect_url = ?, redirect_timestamp = ? WHERE scid = ?",
        )
        .bind(redirect_url)
        .bind(redirect_timestamp)
        .bind(scid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the artifact location (or an error sentinel) for a leased row.
    pub async fn set_file(&self, scid: i64, file: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE snapshots SET file = ? WHERE scid = ?")
            .bind(file)
            .bind(scid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Counts and export
    // ------------------------------------------------------------------

    pub async fn count_total(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(scid) FROM snapshots").await
    }

    pub async fn count_handled(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(scid) FROM snapshots WHERE response IS NOT NULL")
            .await
    }

    pub async fn count_unhandled(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(scid) FROM snapshots WHERE response IS NULL")
            .await
    }

    pub async fn count_downloaded(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(scid) FROM snapshots WHERE file IS NOT NULL")
            .await
    }

    pub async fn count_not_downloaded(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(scid) FROM snapshots WHERE file IS NULL")
            .await
    }

    /// Rows pre-marked from the index because their statuscode can never
    /// yield content (reported as "filtered by status").
    pub async fn count_status_filtered(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(scid) FROM snapshots WHERE response IN ('301', '404')")
            .await
    }

    async fn count(&self, query: &str) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar(query).fetch_one(&self.pool).await?)
    }

    /// All rows with a terminal state, in the result-file column shape.
    pub async fn export_rows(&self) -> Result<Vec<PriorResult>, StoreError> {
        let rows = sqlx::query("SELECT * FROM result_view WHERE response IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_result).collect::<Result<_, _>>().map_err(Into::into)
    }

    /// Full table dump for assertions.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn all_rows(&self) -> Result<Vec<SnapshotRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM snapshots ORDER BY scid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_snapshot).collect::<Result<_, _>>().map_err(Into::into)
    }
}
