//! Index-file reading.
//!
//! The index file holds the raw CDX JSON response: a header array on the
//! first line, then one data array per line. Lines may carry trailing `]`
//! or `,` artifacts from the surrounding JSON array; the parser strips both
//! before decoding.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::error::CdxError;

/// One parsed CDX data row (`fl=timestamp,digest,mimetype,statuscode,original`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxRow {
    pub timestamp: String,
    pub digest: String,
    pub mimetype: String,
    pub statuscode: String,
    pub original: String,
}

/// Parse one index line into a row.
///
/// Tolerates the closing `]]` of the outer JSON array and the `,` row
/// separator; both decode to the same row as the plain form.
pub fn parse_cdx_line(line: &str) -> Result<CdxRow, CdxError> {
    let mut line = line.trim();
    if line.ends_with("]]") {
        line = &line[..line.len() - 1];
    }
    line = line.strip_suffix(',').unwrap_or(line);

    let (timestamp, digest, mimetype, statuscode, original) =
        serde_json::from_str::<(String, String, String, String, String)>(line)?;

    Ok(CdxRow {
        timestamp,
        digest,
        mimetype,
        statuscode,
        original,
    })
}

/// Handle on the per-job index file.
#[derive(Debug, Clone)]
pub struct IndexFile {
    path: PathBuf,
}

impl IndexFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Number of data rows (line count minus the header).
    pub async fn count_rows(&self) -> Result<u64, CdxError> {
        let mut lines = self.lines().await?;
        let mut count: u64 = 0;
        while lines.next_line().await?.is_some() {
            count += 1;
        }
        Ok(count.saturating_sub(1))
    }

    /// Line reader over the raw file, header included.
    pub async fn lines(&self) -> Result<Lines<BufReader<File>>, CdxError> {
        let file = File::open(&self.path).await?;
        Ok(BufReader::new(file).lines())
    }

    pub async fn remove(&self) -> Result<(), CdxError> {
        if self.exists() {
            tokio::fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str =
        r#"["20200101000000", "DIGEST", "text/html", "200", "http://h.example/a/"]"#;

    #[test]
    fn plain_line_parses() {
        let row = parse_cdx_line(PLAIN).unwrap();
        assert_eq!(row.timestamp, "20200101000000");
        assert_eq!(row.statuscode, "200");
        assert_eq!(row.original, "http://h.example/a/");
    }

    #[test]
    fn trailing_artifacts_parse_to_the_same_row() {
        let plain = parse_cdx_line(PLAIN).unwrap();
        let closing = parse_cdx_line(&format!("{PLAIN}]")).unwrap();
        let separator = parse_cdx_line(&format!("{PLAIN},")).unwrap();
        assert_eq!(plain, closing);
        assert_eq!(plain, separator);
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_cdx_line("[\"only\", \"four\", \"fields\", \"here\"]").is_err());
        assert!(parse_cdx_line("not json at all").is_err());
    }

    #[tokio::test]
    async fn count_rows_excludes_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.cdx");
        tokio::fs::write(
            &path,
            "[[\"timestamp\",\"digest\",\"mimetype\",\"statuscode\",\"original\"],\n\
             [\"20200101000000\",\"D\",\"text/html\",\"200\",\"http://h.example/\"],\n\
             [\"20200102000000\",\"D\",\"text/html\",\"200\",\"http://h.example/\"]]",
        )
        .await
        .unwrap();

        let index = IndexFile::new(&path);
        assert!(index.exists());
        assert_eq!(index.count_rows().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remove_tolerates_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let index = IndexFile::new(dir.path().join("missing.cdx"));
        index.remove().await.unwrap();
    }
}
