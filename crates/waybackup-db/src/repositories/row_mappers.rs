//! Row-to-domain conversion helpers.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use waybackup_core::{PriorResult, SnapshotRecord};

/// Convert a full snapshot-table row.
pub fn row_to_snapshot(row: &SqliteRow) -> Result<SnapshotRecord, sqlx::Error> {
    Ok(SnapshotRecord {
        scid: row.try_get("scid")?,
        counter: row.try_get("counter")?,
        timestamp: row.try_get("timestamp")?,
        url_origin: row.try_get("url_origin")?,
        url_archive: row.try_get("url_archive")?,
        redirect_url: row.try_get("redirect_url")?,
        redirect_timestamp: row.try_get("redirect_timestamp")?,
        response: row.try_get("response")?,
        file: row.try_get("file")?,
    })
}

/// Convert a result-view row (no internal bookkeeping columns).
pub fn row_to_result(row: &SqliteRow) -> Result<PriorResult, sqlx::Error> {
    Ok(PriorResult {
        timestamp: row.try_get("timestamp")?,
        url_archive: row.try_get("url_archive")?,
        url_origin: row.try_get("url_origin")?,
        redirect_url: row.try_get("redirect_url")?,
        redirect_timestamp: row.try_get("redirect_timestamp")?,
        response: row.try_get("response")?,
        file: row.try_get("file")?,
    })
}
