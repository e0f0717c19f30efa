//! Job table access: phase latches and resume progress.

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

/// The job row as observed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    /// Whether the row already existed (i.e. this run is a resume).
    pub existed: bool,
    pub progress_done: i64,
    pub progress_total: i64,
    /// Phase latches; flipped irreversibly as the pipeline advances.
    pub insert_done: bool,
    pub index_done: bool,
    pub filter_done: bool,
}

/// Access to the job table.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
    job_key: String,
}

impl JobRepository {
    pub fn new(pool: SqlitePool, job_key: impl Into<String>) -> Self {
        Self {
            pool,
            job_key: job_key.into(),
        }
    }

    /// Look up the job row for this key, inserting a fresh one (all latches
    /// down) when none exists yet.
    pub async fn ensure(&self) -> Result<JobState, StoreError> {
        let existing = sqlx::query(
            r#"
            SELECT progress_done, progress_total, insert_done, index_done, filter_done
            FROM jobs WHERE job_key = ?
            "#,
        )
        .bind(&self.job_key)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            return Ok(JobState {
                existed: true,
                progress_done: row.try_get("progress_done")?,
                progress_total: row.try_get("progress_total")?,
                insert_done: row.try_get::<i64, _>("insert_done")? != 0,
                index_done: row.try_get::<i64, _>("index_done")? != 0,
                filter_done: row.try_get::<i64, _>("filter_done")? != 0,
            });
        }

        sqlx::query("INSERT OR IGNORE INTO jobs (job_key) VALUES (?)")
            .bind(&self.job_key)
            .execute(&self.pool)
            .await?;

        Ok(JobState {
            existed: false,
            progress_done: 0,
            progress_total: 0,
            insert_done: false,
            index_done: false,
            filter_done: false,
        })
    }

    /// Re-read the phase latches.
    pub async fn latches(&self) -> Result<(bool, bool, bool), StoreError> {
        let row = sqlx::query(
            "SELECT insert_done, index_done, filter_done FROM jobs WHERE job_key = ?",
        )
        .bind(&self.job_key)
        .fetch_one(&self.pool)
        .await?;
        Ok((
            row.try_get::<i64, _>("insert_done")? != 0,
            row.try_get::<i64, _>("index_done")? != 0,
            row.try_get::<i64, _>("filter_done")? != 0,
        ))
    }

    pub async fn set_insert_done(&self) -> Result<(), StoreError> {
        self.set_latch("insert_done").await
    }

    pub async fn set_index_done(&self) -> Result<(), StoreError> {
        self.set_latch("index_done").await
    }

    pub async fn set_filter_done(&self) -> Result<(), StoreError> {
        self.set_latch("filter_done").await
    }

    async fn set_latch(&self, column: &str) -> Result<(), StoreError> {
        // column names are the fixed latch identifiers above, never user input
        let query = format!("UPDATE jobs SET {column} = 1 WHERE job_key = ?");
        sqlx::query(&query)
            .bind(&self.job_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist the handled/total counters for the resume banner.
    pub async fn write_progress(&self, done: i64, total: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET progress_done = ?, progress_total = ? WHERE job_key = ?")
            .bind(done)
            .bind(total)
            .bind(&self.job_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
