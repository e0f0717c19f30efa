//! Persistent work queue over the snapshot table.
//!
//! `claim()` leases the lowest-`scid` pending row by flipping its `response`
//! to `LOCK`; `commit()` writes terminal state back. SQLite has no
//! `SKIP LOCKED`, so the claim statement runs behind a process-wide mutex,
//! which is exactly as wide as the lease transaction itself.

use std::sync::Arc;

use tokio::sync::Mutex;

use waybackup_core::{SnapshotRecord, SnapshotUpdate};
use waybackup_db::{SnapshotRepository, StoreError};

/// Multi-consumer handle on the snapshot work queue.
#[derive(Clone)]
pub struct WorkQueue {
    repo: SnapshotRepository,
    claim_lock: Arc<Mutex<()>>,
}

impl WorkQueue {
    pub fn new(repo: SnapshotRepository) -> Self {
        Self {
            repo,
            claim_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Lease the next pending snapshot, or `None` when the queue is drained.
    pub async fn claim(&self) -> Result<Option<SnapshotRecord>, StoreError> {
        let _guard = self.claim_lock.lock().await;
        self.repo.claim_next().await
    }

    /// Commit bound columns for a leased row.
    pub async fn commit(&self, scid: i64, update: &SnapshotUpdate) -> Result<(), StoreError> {
        self.repo.commit(scid, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use waybackup_core::NewSnapshot;
    use waybackup_db::open_test_store;

    async fn queue_with_rows(n: usize) -> WorkQueue {
        let pool = open_test_store().await.unwrap();
        let repo = SnapshotRepository::new(pool);
        let rows: Vec<_> = (0..n)
            .map(|i| {
                NewSnapshot::from_cdx(
                    format!("202001010000{i:02}"),
                    format!("http://h.example/{i}"),
                    "200",
                )
            })
            .collect();
        repo.insert_batch(&rows).await.unwrap();
        WorkQueue::new(repo)
    }

    #[tokio::test]
    async fn drains_in_scid_order() {
        let queue = queue_with_rows(3).await;
        let mut origins = Vec::new();
        while let Some(snapshot) = queue.claim().await.unwrap() {
            assert_eq!(snapshot.response.as_deref(), Some("LOCK"));
            origins.push(snapshot.url_origin);
        }
        assert_eq!(
            origins,
            vec![
                "http://h.example/0",
                "http://h.example/1",
                "http://h.example/2"
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_claims_never_return_the_same_row() {
        let queue = queue_with_rows(50).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(snapshot) = queue.claim().await.unwrap() {
                    assert_eq!(snapshot.response.as_deref(), Some("LOCK"));
                    claimed.push(snapshot.scid);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(all.len(), 50);
        assert_eq!(unique.len(), 50);
    }

    #[tokio::test]
    async fn commit_finalizes_a_lease() {
        let queue = queue_with_rows(1).await;
        let snapshot = queue.claim().await.unwrap().unwrap();

        queue
            .commit(
                snapshot.scid,
                &SnapshotUpdate {
                    response: Some("200".to_string()),
                    file: Some("/out/h.example/0".to_string()),
                    ..SnapshotUpdate::default()
                },
            )
            .await
            .unwrap();

        // a committed row never comes back
        assert!(queue.claim().await.unwrap().is_none());
    }
}
