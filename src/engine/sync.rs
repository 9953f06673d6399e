//! Reconciles freshly computed pair scores with persisted match records.
//!
//! Per pair: read, then insert / skip / versioned update. A lost insert race
//! or a moved version sends the pair back to the read step, bounded by
//! `max_conflict_retries`. Transient store failures are retried with backoff
//! inside each step.

use crate::engine::retry::{retry_with_backoff, RetryPolicy};
use crate::error::EngineError;
use crate::models::{MatchRecord, PairOutcome, PairScore, PairStatus, RecomputeReport};
use crate::services::{MatchStore, StoreError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Synchronizer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub max_conflict_retries: u32,
    pub store_retry: RetryPolicy,
    /// Pairs written concurrently within one batch
    pub max_in_flight: usize,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            store_retry: RetryPolicy::default(),
            max_in_flight: 8,
        }
    }
}

/// Sole writer of match records
pub struct MatchSynchronizer {
    store: Arc<dyn MatchStore>,
    policy: SyncPolicy,
}

impl MatchSynchronizer {
    pub fn new(store: Arc<dyn MatchStore>, policy: SyncPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Upsert a batch of pair scores, one outcome per input in input order
    ///
    /// Pairs are independent: a failed pair is reported and the rest of the
    /// batch still goes through.
    pub async fn upsert(&self, pairs: Vec<PairScore>) -> RecomputeReport {
        let total = pairs.len();

        let outcomes: Vec<PairOutcome> = stream::iter(pairs)
            .map(|pair| async move {
                let result = self.upsert_one(&pair).await;
                to_outcome(pair, result)
            })
            .buffered(self.policy.max_in_flight.max(1))
            .collect()
            .await;

        let report = RecomputeReport { outcomes };
        tracing::info!(
            total,
            created = report.count(PairStatus::Created),
            updated = report.count(PairStatus::Updated),
            unchanged = report.count(PairStatus::Unchanged),
            failed = report.count(PairStatus::Failed),
            "Match upsert batch finished"
        );
        report
    }

    /// Upsert a single pair
    pub async fn upsert_one(&self, pair: &PairScore) -> Result<(PairStatus, MatchRecord), EngineError> {
        let computed_at = Utc::now();
        let retry = self.policy.store_retry;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let existing = retry_with_backoff(retry, "get", || self.store.get(&pair.key)).await?;

            match existing {
                None => {
                    let inserted =
                        retry_with_backoff(retry, "insert", || self.store.insert(pair, computed_at)).await;
                    match inserted {
                        Ok(record) => return Ok((PairStatus::Created, record)),
                        Err(StoreError::Conflict(_)) => {
                            tracing::debug!("Insert race lost for {}, re-reading", pair.key);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Some(record) if record.holds(pair) => {
                    return Ok((PairStatus::Unchanged, record));
                }
                Some(record) => {
                    let updated = retry_with_backoff(retry, "update", || {
                        self.store.update_if_version(pair, record.version, computed_at)
                    })
                    .await?;
                    match updated {
                        Some(record) => return Ok((PairStatus::Updated, record)),
                        None => {
                            tracing::debug!(
                                "Version {} of {} moved on, re-reading",
                                record.version,
                                pair.key
                            );
                        }
                    }
                }
            }

            if attempts > self.policy.max_conflict_retries {
                tracing::warn!("Giving up on {} after {} attempts", pair.key, attempts);
                return Err(EngineError::Conflict {
                    key: pair.key.clone(),
                    attempts,
                });
            }
        }
    }
}

fn to_outcome(pair: PairScore, result: Result<(PairStatus, MatchRecord), EngineError>) -> PairOutcome {
    match result {
        Ok((status, record)) => PairOutcome {
            key: pair.key,
            status,
            score: Some(record.score),
            error: None,
            retryable: false,
        },
        Err(e) => {
            tracing::warn!("Failed to upsert match {}: {}", pair.key, e);
            PairOutcome {
                key: pair.key,
                status: PairStatus::Failed,
                score: None,
                retryable: e.is_retryable(),
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PairKey, ScoreBreakdown};
    use crate::services::InMemoryMatchStore;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Match store that injects races and outages in front of the real one
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryMatchStore,
        unavailable_gets: AtomicU32,
        raced_inserts: AtomicU32,
        raced_updates: AtomicU32,
        down_startup: Option<String>,
    }

    impl FlakyStore {
        fn take(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl MatchStore for FlakyStore {
        async fn get(&self, key: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
            if self.down_startup.as_deref() == Some(key.startup_id.as_str()) {
                return Err(StoreError::Unavailable("shard down".to_string()));
            }
            if Self::take(&self.unavailable_gets) {
                return Err(StoreError::Unavailable("timeout".to_string()));
            }
            self.inner.get(key).await
        }

        async fn insert(&self, pair: &PairScore, computed_at: DateTime<Utc>) -> Result<MatchRecord, StoreError> {
            if Self::take(&self.raced_inserts) {
                // Another writer gets there first with a different score
                let mut rival = pair.clone();
                rival.score = pair.score.wrapping_add(1) % 100;
                rival.breakdown.skill_points = rival.score.min(50);
                self.inner.insert(&rival, computed_at).await?;
            }
            self.inner.insert(pair, computed_at).await
        }

        async fn update_if_version(
            &self,
            pair: &PairScore,
            expected_version: i64,
            computed_at: DateTime<Utc>,
        ) -> Result<Option<MatchRecord>, StoreError> {
            if Self::take(&self.raced_updates) {
                let current = self.inner.get(&pair.key).await?;
                if let Some(current) = current {
                    let rival = PairScore {
                        key: pair.key.clone(),
                        score: current.score,
                        breakdown: current.breakdown,
                    };
                    self.inner.update_if_version(&rival, current.version, computed_at).await?;
                }
            }
            self.inner.update_if_version(pair, expected_version, computed_at).await
        }

        async fn list_for_talent(&self, talent_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
            self.inner.list_for_talent(talent_id).await
        }

        async fn list_for_startups(&self, startup_ids: &[String]) -> Result<Vec<MatchRecord>, StoreError> {
            self.inner.list_for_startups(startup_ids).await
        }

        async fn health_check(&self) -> Result<bool, StoreError> {
            Ok(true)
        }
    }

    fn pair(talent: &str, startup: &str, skill: u8, industry: u8, stage: u8) -> PairScore {
        let breakdown = ScoreBreakdown { skill_points: skill, industry_points: industry, stage_bonus: stage };
        PairScore {
            key: PairKey::new(talent, startup),
            score: breakdown.total(),
            breakdown,
        }
    }

    fn policy() -> SyncPolicy {
        SyncPolicy {
            max_conflict_retries: 3,
            store_retry: RetryPolicy::new(3, 0),
            max_in_flight: 4,
        }
    }

    fn synchronizer(store: Arc<dyn MatchStore>) -> MatchSynchronizer {
        MatchSynchronizer::new(store, policy())
    }

    #[tokio::test]
    async fn test_create_then_unchanged_then_update() {
        let store = Arc::new(InMemoryMatchStore::new());
        let sync = synchronizer(store.clone());

        let (status, created) = sync.upsert_one(&pair("t1", "s1", 25, 30, 20)).await.unwrap();
        assert_eq!(status, PairStatus::Created);
        assert_eq!(created.score, 75);

        let (status, same) = sync.upsert_one(&pair("t1", "s1", 25, 30, 20)).await.unwrap();
        assert_eq!(status, PairStatus::Unchanged);
        assert_eq!(same.updated_at, created.updated_at);
        assert_eq!(same.version, 1);

        let (status, updated) = sync.upsert_one(&pair("t1", "s1", 50, 30, 20)).await.unwrap();
        assert_eq!(status, PairStatus::Updated);
        assert_eq!(updated.score, 100);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.id, created.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_breakdown_change_with_same_total_is_an_update() {
        let store = Arc::new(InMemoryMatchStore::new());
        let sync = synchronizer(store);

        sync.upsert_one(&pair("t1", "s1", 30, 15, 0)).await.unwrap();
        let (status, record) = sync.upsert_one(&pair("t1", "s1", 15, 30, 0)).await.unwrap();

        assert_eq!(status, PairStatus::Updated);
        assert_eq!(record.score, 45);
        assert_eq!(record.breakdown.industry_points, 30);
    }

    #[tokio::test]
    async fn test_lost_insert_race_becomes_update() {
        let store = Arc::new(FlakyStore {
            raced_inserts: AtomicU32::new(1),
            ..Default::default()
        });
        let sync = synchronizer(store.clone());

        let (status, record) = sync.upsert_one(&pair("t1", "s1", 25, 0, 10)).await.unwrap();

        assert_eq!(status, PairStatus::Updated);
        assert_eq!(record.score, 35);
        assert_eq!(record.version, 2);
        assert_eq!(store.inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_moved_version_is_retried() {
        let store = Arc::new(FlakyStore {
            raced_updates: AtomicU32::new(2),
            ..Default::default()
        });
        store.inner.insert(&pair("t1", "s1", 0, 0, 0), Utc::now()).await.unwrap();
        let sync = synchronizer(store.clone());

        let (status, record) = sync.upsert_one(&pair("t1", "s1", 50, 0, 0)).await.unwrap();

        assert_eq!(status, PairStatus::Updated);
        assert_eq!(record.score, 50);
        assert_eq!(record.version, 4);
    }

    #[tokio::test]
    async fn test_conflict_retries_are_bounded() {
        let store = Arc::new(FlakyStore {
            raced_updates: AtomicU32::new(u32::MAX),
            ..Default::default()
        });
        store.inner.insert(&pair("t1", "s1", 0, 0, 0), Utc::now()).await.unwrap();
        let sync = synchronizer(store);

        let err = sync.upsert_one(&pair("t1", "s1", 50, 0, 0)).await.unwrap_err();

        match err {
            EngineError::Conflict { key, attempts } => {
                assert_eq!(key, PairKey::new("t1", "s1"));
                assert_eq!(attempts, 4);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_read_failures_are_retried() {
        let store = Arc::new(FlakyStore {
            unavailable_gets: AtomicU32::new(2),
            ..Default::default()
        });
        let sync = synchronizer(store);

        let (status, _) = sync.upsert_one(&pair("t1", "s1", 10, 0, 0)).await.unwrap();
        assert_eq!(status, PairStatus::Created);
    }

    #[tokio::test]
    async fn test_batch_reports_partial_failure_without_rollback() {
        let store = Arc::new(FlakyStore {
            down_startup: Some("s2".to_string()),
            ..Default::default()
        });
        let sync = synchronizer(store.clone());

        let report = sync
            .upsert(vec![
                pair("t1", "s1", 25, 0, 0),
                pair("t1", "s2", 25, 0, 0),
                pair("t1", "s3", 25, 0, 0),
            ])
            .await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.count(PairStatus::Created), 2);
        assert_eq!(report.outcomes[1].status, PairStatus::Failed);
        assert!(report.outcomes[1].retryable);
        assert_eq!(store.inner.len().await, 2);
    }
}
