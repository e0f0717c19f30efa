//! Store setup and schema creation.
//!
//! Entry points call [`open_store`] with the resolved database path; tests
//! use [`open_test_store`] for a fresh in-memory database with the same
//! schema.

use std::path::Path;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

use crate::error::StoreError;

/// Open (or create) the SQLite store at `db_path` and ensure the schema.
///
/// WAL mode keeps concurrent worker commits from tripping over each other;
/// the busy timeout covers the remaining write contention.
pub async fn open_store(db_path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30)),
    )
    .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Fresh in-memory store with the production schema.
///
/// Pinned to a single connection: every pooled connection to
/// `sqlite::memory:` would otherwise see its own empty database.
#[cfg(any(test, feature = "test-utils"))]
pub async fn open_test_store() -> Result<SqlitePool, StoreError> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and the export view.
///
/// Safe to call repeatedly, everything uses IF NOT EXISTS.
async fn create_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    // One row per (origin URL, mode, filter set); the phase latches are the
    // sole basis for skipping completed pipeline phases on resume.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            job_key TEXT PRIMARY KEY,
            progress_done INTEGER NOT NULL DEFAULT 0,
            progress_total INTEGER NOT NULL DEFAULT 0,
            insert_done INTEGER NOT NULL DEFAULT 0,
            index_done INTEGER NOT NULL DEFAULT 0,
            filter_done INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            scid INTEGER PRIMARY KEY AUTOINCREMENT,
            counter INTEGER,
            timestamp TEXT NOT NULL,
            url_archive TEXT NOT NULL,
            url_origin TEXT NOT NULL,
            redirect_url TEXT,
            redirect_timestamp TEXT,
            response TEXT,
            file TEXT,
            UNIQUE (url_archive)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Projection consumed by the result-file export.
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS result_view AS
            SELECT
                timestamp,
                url_archive,
                url_origin,
                redirect_url,
                redirect_timestamp,
                response,
                file
            FROM snapshots
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let pool = open_test_store().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn opens_store_on_disk_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta/job.db");
        let pool = open_store(&path).await.unwrap();
        sqlx::query("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(path.exists());
    }
}
