//! Result-file projection.
//!
//! A flat CSV with one line per terminally-processed snapshot. Written at
//! shutdown from the store, read back by the pipeline on the next run so a
//! job survives even a deleted database. Header:
//!
//! `timestamp,url_archive,url_origin,redirect_url,redirect_timestamp,response,file`

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;

use waybackup_core::PriorResult;

use crate::error::StoreError;

/// Handle on the per-job result CSV.
#[derive(Debug, Clone)]
pub struct ResultFile {
    path: PathBuf,
}

impl ResultFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read all prior rows. An absent file yields an empty set.
    pub fn read(&self) -> Result<Vec<PriorResult>, StoreError> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<PriorResult>, _>>()?;
        info!(rows = rows.len(), path = %self.path.display(), "read prior result file");
        Ok(rows)
    }

    /// Replace the file with a fresh projection.
    pub fn write(&self, rows: &[PriorResult]) -> Result<(), StoreError> {
        let file = File::create(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!(rows = rows.len(), path = %self.path.display(), "wrote result file");
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ts: &str, origin: &str, response: Option<&str>) -> PriorResult {
        PriorResult {
            timestamp: ts.to_string(),
            url_archive: waybackup_core::archive_url(ts, origin),
            url_origin: origin.to_string(),
            redirect_url: None,
            redirect_timestamp: None,
            response: response.map(str::to_string),
            file: None,
        }
    }

    #[test]
    fn absent_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = ResultFile::new(dir.path().join("job.csv"));
        assert!(!file.exists());
        assert!(file.read().unwrap().is_empty());
    }

    #[test]
    fn written_rows_read_back_with_nullable_columns() {
        let dir = tempfile::tempdir().unwrap();
        let file = ResultFile::new(dir.path().join("job.csv"));

        let rows = vec![
            row("20200101000000", "http://h.example/a", Some("200")),
            row("20200102000000", "http://h.example/b", None),
        ];
        file.write(&rows).unwrap();

        let read = file.read().unwrap();
        assert_eq!(read, rows);
        assert_eq!(read[1].response, None);
    }

    #[test]
    fn header_matches_the_documented_shape() {
        let dir = tempfile::tempdir().unwrap();
        let file = ResultFile::new(dir.path().join("job.csv"));
        file.write(&[row("20200101000000", "http://h.example/a", Some("200"))])
            .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "timestamp,url_archive,url_origin,redirect_url,redirect_timestamp,response,file"
        );
    }
}
