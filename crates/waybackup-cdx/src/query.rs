//! CDX query construction.
//!
//! The query URL is built deterministically from the job configuration, so
//! the same invocation always hits the same index slice.

use chrono::{Datelike, Utc};

use waybackup_core::{BackupConfig, url_split};

const CDX_ENDPOINT: &str = "https://web.archive.org/cdx/search/cdx";
const PROJECTION: &str = "timestamp,digest,mimetype,statuscode,original";

/// A validated, ready-to-send CDX query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxQuery {
    url: String,
}

impl CdxQuery {
    /// Build the query for a job configuration.
    pub fn build(config: &BackupConfig) -> Self {
        Self::build_for_year(config, Utc::now().year())
    }

    /// Same as [`CdxQuery::build`] with an explicit "current year" so the
    /// years-back window stays testable.
    pub fn build_for_year(config: &BackupConfig, current_year: i32) -> Self {
        let split = url_split(&config.url, false);

        let mut target = split.domain;
        if !split.subdir.is_empty() {
            target.push('/');
            target.push_str(&split.subdir);
        }
        if !split.filename.is_empty() {
            target.push('/');
            target.push_str(&split.filename);
        }
        if !config.explicit {
            target.push_str("/*");
        }

        let mut period = String::new();
        if let Some(years) = config.range_years {
            period = format!("&from={}", current_year - years as i32);
        } else {
            if let Some(start) = &config.start {
                period.push_str(&format!("&from={start}"));
            }
            if let Some(end) = &config.end {
                period.push_str(&format!("&to={end}"));
            }
        }

        let limit = config
            .limit
            .map_or_else(String::new, |n| format!("&limit={n}"));

        let filter_filetype = if config.filetypes.is_empty() {
            String::new()
        } else {
            format!("&filter=original:.*\\.({})$", config.filetypes.join("|"))
        };

        let filter_statuscode = if config.statuscodes.is_empty() {
            String::new()
        } else {
            format!("&filter=statuscode:({})$", config.statuscodes.join("|"))
        };

        Self {
            url: format!(
                "{CDX_ENDPOINT}?output=json&url={target}{period}&fl={PROJECTION}{limit}{filter_filetype}{filter_statuscode}"
            ),
        }
    }

    /// The full query URL.
    pub fn as_url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use waybackup_core::Mode;

    fn config(url: &str) -> BackupConfig {
        BackupConfig {
            url: url.to_string(),
            mode: Mode::All,
            explicit: false,
            range_years: None,
            start: None,
            end: None,
            limit: None,
            filetypes: Vec::new(),
            statuscodes: Vec::new(),
            output: PathBuf::from("/out"),
            metadata: PathBuf::from("/out"),
            no_redirect: false,
            retry: 0,
            workers: 1,
            delay_secs: 0,
            keep: false,
            reset: false,
        }
    }

    #[test]
    fn wildcard_query_over_subdir() {
        let query = CdxQuery::build_for_year(&config("https://example.com/blog/"), 2026);
        assert_eq!(
            query.as_url(),
            "https://web.archive.org/cdx/search/cdx?output=json&url=example.com/blog/*\
             &fl=timestamp,digest,mimetype,statuscode,original"
        );
    }

    #[test]
    fn explicit_skips_the_wildcard() {
        let mut c = config("https://example.com/page.html");
        c.explicit = true;
        let query = CdxQuery::build_for_year(&c, 2026);
        assert!(query.as_url().contains("url=example.com/page.html&fl="));
        assert!(!query.as_url().contains("/*"));
    }

    #[test]
    fn range_wins_over_explicit_bounds() {
        let mut c = config("https://example.com");
        c.range_years = Some(3);
        c.start = Some("20200101000000".to_string());
        let query = CdxQuery::build_for_year(&c, 2026);
        assert!(query.as_url().contains("&from=2023"));
        assert!(!query.as_url().contains("&from=20200101000000"));
    }

    #[test]
    fn start_and_end_bounds() {
        let mut c = config("https://example.com");
        c.start = Some("20200101000000".to_string());
        c.end = Some("20201231235959".to_string());
        let query = CdxQuery::build_for_year(&c, 2026);
        assert!(
            query
                .as_url()
                .contains("&from=20200101000000&to=20201231235959")
        );
    }

    #[test]
    fn filters_render_as_alternation_groups() {
        let mut c = config("https://example.com");
        c.limit = Some(500);
        c.filetypes = vec!["jpg".to_string(), "css".to_string()];
        c.statuscodes = vec!["200".to_string(), "301".to_string()];
        let query = CdxQuery::build_for_year(&c, 2026);
        assert!(query.as_url().contains("&limit=500"));
        assert!(query.as_url().contains("&filter=original:.*\\.(jpg|css)$"));
        assert!(query.as_url().contains("&filter=statuscode:(200|301)$"));
    }
}
