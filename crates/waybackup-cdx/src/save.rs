//! Save-to-archive request.
//!
//! Sends a page to the Wayback Machine's save endpoint. The archive answers
//! 302 with a redirect to the created (or recently existing) snapshot; the
//! snapshot age decides whether a new capture was made, since the endpoint
//! refuses re-captures within one hour.

use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use tracing::info;

use waybackup_core::url_get_timestamp;

use crate::error::CdxError;

const SAVE_ENDPOINT: &str = "https://web.archive.org/save";
// The save endpoint rejects non-browser agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A fresh snapshot was captured.
    Created { snapshot_url: String },
    /// A snapshot newer than the 1-hour limit already exists.
    RecentExists {
        snapshot_url: String,
        minutes_ago: i64,
    },
    /// The page was not found by the archive.
    NotFound,
    /// Anything else.
    Unexpected { status: u16 },
}

/// Ask the archive to capture `url` now.
pub async fn save_page(url: &str) -> Result<SaveOutcome, CdxError> {
    let client = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(60))
        .build()?;

    info!(url, "saving page to the wayback machine");
    let response = client.get(format!("{SAVE_ENDPOINT}/{url}")).send().await?;
    let status = response.status().as_u16();

    let outcome = match status {
        302 => {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            classify_redirect(location)
        }
        404 => SaveOutcome::NotFound,
        other => SaveOutcome::Unexpected { status: other },
    };

    match &outcome {
        SaveOutcome::Created { snapshot_url } => info!(snapshot_url, "new snapshot created"),
        SaveOutcome::RecentExists {
            snapshot_url,
            minutes_ago,
        } => info!(
            snapshot_url,
            minutes_ago, "snapshot already exists (1 hour limit)"
        ),
        SaveOutcome::NotFound => info!("archive answered 404 (not found)"),
        SaveOutcome::Unexpected { status } => info!(status, "unexpected response"),
    }

    Ok(outcome)
}

fn classify_redirect(snapshot_url: String) -> SaveOutcome {
    let minutes_ago = url_get_timestamp(&snapshot_url)
        .and_then(|ts| NaiveDateTime::parse_from_str(&ts, "%Y%m%d%H%M%S").ok())
        .map(|snapshot_time| (Utc::now().naive_utc() - snapshot_time).num_minutes());

    match minutes_ago {
        Some(age) if age > 1 => SaveOutcome::RecentExists {
            snapshot_url,
            minutes_ago: age,
        },
        _ => SaveOutcome::Created { snapshot_url },
    }
}
