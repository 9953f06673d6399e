//! Ranked, read-only views over match records.

use crate::core::{rank_for_founder, rank_for_talent};
use crate::error::EngineError;
use crate::models::{StartupMatch, StartupMatchGroup, StartupPosting, TalentMatch, TalentProfile};
use crate::services::{MatchStore, ProfileRepository};
use std::collections::HashMap;
use std::sync::Arc;

/// Serves top-N matches joined with the current counterpart read model
///
/// Store failures are returned immediately; reads are never retried here.
pub struct RankedQueryService {
    profiles: Arc<dyn ProfileRepository>,
    store: Arc<dyn MatchStore>,
}

impl RankedQueryService {
    pub fn new(profiles: Arc<dyn ProfileRepository>, store: Arc<dyn MatchStore>) -> Self {
        Self { profiles, store }
    }

    /// Startups matched to a talent, best first
    pub async fn list_matches_for_talent(
        &self,
        talent_id: &str,
        limit: usize,
    ) -> Result<Vec<StartupMatch>, EngineError> {
        if talent_id.trim().is_empty() {
            return Err(EngineError::Input("blank talent id".to_string()));
        }

        let mut records = self.store.list_for_talent(talent_id).await?;
        if records.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        rank_for_talent(&mut records);

        let startup_ids = unique_ids(records.iter().map(|r| r.startup_id.as_str()));
        let startups: HashMap<String, StartupPosting> = self
            .profiles
            .get_startups(&startup_ids)
            .await?
            .into_iter()
            .map(|s| (s.startup_id.clone(), s))
            .collect();

        let mut matches = Vec::with_capacity(limit.min(records.len()));
        for record in records {
            if matches.len() == limit {
                break;
            }
            match startups.get(&record.startup_id) {
                Some(startup) => matches.push(StartupMatch {
                    startup: startup.clone(),
                    record,
                }),
                None => tracing::warn!(
                    "Skipping match {}: startup no longer exists",
                    record.key()
                ),
            }
        }

        tracing::debug!("Talent {}: returning {} ranked matches", talent_id, matches.len());
        Ok(matches)
    }

    /// Talent matched to a founder's startups, best first, grouped by startup
    ///
    /// `limit` applies to the total number of matches across groups. Groups
    /// are ordered by their best match.
    pub async fn list_matches_for_founder(
        &self,
        founder_id: &str,
        limit: usize,
    ) -> Result<Vec<StartupMatchGroup>, EngineError> {
        if founder_id.trim().is_empty() {
            return Err(EngineError::Input("blank founder id".to_string()));
        }

        let startups = self.profiles.startups_for_founder(founder_id).await?;
        if startups.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let startup_ids: Vec<String> = startups.iter().map(|s| s.startup_id.clone()).collect();
        let startups: HashMap<String, StartupPosting> =
            startups.into_iter().map(|s| (s.startup_id.clone(), s)).collect();

        let mut records = self.store.list_for_startups(&startup_ids).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        rank_for_founder(&mut records);

        let talent_ids = unique_ids(records.iter().map(|r| r.talent_id.as_str()));
        let talents: HashMap<String, TalentProfile> = self
            .profiles
            .get_talents(&talent_ids)
            .await?
            .into_iter()
            .map(|t| (t.talent_id.clone(), t))
            .collect();

        let mut groups: Vec<StartupMatchGroup> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();
        let mut taken = 0;

        for record in records {
            if taken == limit {
                break;
            }
            let (Some(startup), Some(talent)) =
                (startups.get(&record.startup_id), talents.get(&record.talent_id))
            else {
                tracing::warn!("Skipping match {}: talent no longer exists", record.key());
                continue;
            };

            let idx = *group_index.entry(record.startup_id.clone()).or_insert_with(|| {
                groups.push(StartupMatchGroup {
                    startup: startup.clone(),
                    matches: Vec::new(),
                });
                groups.len() - 1
            });
            groups[idx].matches.push(TalentMatch {
                talent: talent.clone(),
                record,
            });
            taken += 1;
        }

        tracing::debug!(
            "Founder {}: returning {} matches in {} groups",
            founder_id,
            taken,
            groups.len()
        );
        Ok(groups)
    }
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.filter(|id| seen.insert(*id)).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Availability, Commitment, Industry, MatchRecord, PairKey, PairScore, ScoreBreakdown, Stage,
    };
    use crate::services::{InMemoryMatchStore, InMemoryProfiles, StoreError};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn talent(id: &str) -> TalentProfile {
        TalentProfile {
            talent_id: id.to_string(),
            name: None,
            skills: vec!["rust".to_string()],
            availability: Availability::PartTime,
            commitment: Commitment::Contractor,
            bio: String::new(),
            updated_at: None,
        }
    }

    fn startup(id: &str, founder: &str) -> StartupPosting {
        StartupPosting {
            startup_id: id.to_string(),
            founder_id: founder.to_string(),
            name: id.to_string(),
            industry: Industry::Technology,
            stage: Stage::Mvp,
            skills_needed: vec!["rust".to_string()],
            description: None,
            created_at: base_time(),
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(talent: &str, startup: &str, score: u8, minutes: i64) -> MatchRecord {
        let pair = PairScore {
            key: PairKey::new(talent, startup),
            score,
            breakdown: ScoreBreakdown { skill_points: score.min(50), industry_points: score.saturating_sub(50).min(30), stage_bonus: score.saturating_sub(80) },
        };
        MatchRecord::from_pair(&pair, base_time() + Duration::minutes(minutes))
    }

    async fn service() -> (RankedQueryService, Arc<InMemoryProfiles>, Arc<InMemoryMatchStore>) {
        let profiles = Arc::new(InMemoryProfiles::new());
        let store = Arc::new(InMemoryMatchStore::new());
        (RankedQueryService::new(profiles.clone(), store.clone()), profiles, store)
    }

    #[tokio::test]
    async fn test_talent_view_orders_and_limits() {
        let (svc, profiles, store) = service().await;
        for id in ["s1", "s2", "s3", "s4"] {
            profiles.put_startup(startup(id, "f1")).await;
        }
        store.seed(record("t1", "s1", 60, 0)).await;
        store.seed(record("t1", "s2", 80, 0)).await;
        store.seed(record("t1", "s3", 60, 5)).await;
        store.seed(record("t1", "s4", 60, 5)).await;

        let matches = svc.list_matches_for_talent("t1", 3).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.startup.startup_id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s3", "s4"]);

        let all = svc.list_matches_for_talent("t1", 10).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].startup.startup_id, "s1");
    }

    #[tokio::test]
    async fn test_orphans_are_skipped_and_do_not_count() {
        let (svc, profiles, store) = service().await;
        profiles.put_startup(startup("s1", "f1")).await;
        profiles.put_startup(startup("s3", "f1")).await;
        store.seed(record("t1", "s1", 50, 0)).await;
        store.seed(record("t1", "gone", 90, 0)).await;
        store.seed(record("t1", "s3", 40, 0)).await;

        let matches = svc.list_matches_for_talent("t1", 2).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.startup.startup_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
    }

    #[tokio::test]
    async fn test_unknown_talent_gets_empty_list() {
        let (svc, _, _) = service().await;
        assert!(svc.list_matches_for_talent("nobody", 5).await.unwrap().is_empty());
        assert!(matches!(
            svc.list_matches_for_talent(" ", 5).await,
            Err(EngineError::Input(_))
        ));
    }

    #[tokio::test]
    async fn test_founder_view_groups_by_best_match() {
        let (svc, profiles, store) = service().await;
        profiles.put_startup(startup("s1", "f1")).await;
        profiles.put_startup(startup("s2", "f1")).await;
        profiles.put_startup(startup("other", "f2")).await;
        for id in ["t1", "t2", "t3"] {
            profiles.put_talent(talent(id)).await;
        }
        store.seed(record("t1", "s1", 40, 0)).await;
        store.seed(record("t2", "s2", 90, 0)).await;
        store.seed(record("t3", "s1", 70, 0)).await;
        store.seed(record("t3", "s2", 10, 0)).await;
        store.seed(record("t1", "other", 100, 0)).await;

        let groups = svc.list_matches_for_founder("f1", 3).await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].startup.startup_id, "s2");
        assert_eq!(groups[0].matches.len(), 1);
        let s1: Vec<&str> = groups[1].matches.iter().map(|m| m.talent.talent_id.as_str()).collect();
        assert_eq!(s1, vec!["t3", "t1"]);
        assert!(svc.list_matches_for_founder("f3", 3).await.unwrap().is_empty());
    }

    struct DownStore;

    #[async_trait::async_trait]
    impl MatchStore for DownStore {
        async fn get(&self, _: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn insert(&self, _: &PairScore, _: DateTime<Utc>) -> Result<MatchRecord, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn update_if_version(
            &self,
            _: &PairScore,
            _: i64,
            _: DateTime<Utc>,
        ) -> Result<Option<MatchRecord>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn list_for_talent(&self, _: &str) -> Result<Vec<MatchRecord>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn list_for_startups(&self, _: &[String]) -> Result<Vec<MatchRecord>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn health_check(&self) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_store_outage_is_retryable_error_not_empty_list() {
        let svc = RankedQueryService::new(Arc::new(InMemoryProfiles::new()), Arc::new(DownStore));
        let err = svc.list_matches_for_talent("t1", 5).await.unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        assert!(err.is_retryable());
    }
}
