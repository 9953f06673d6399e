use crate::core::filters::{startup_in_scope, talent_in_scope};
use crate::models::{CandidateScope, MatchRecord, PairKey, PairScore, StartupPosting, TalentProfile};
use crate::services::store::{MatchStore, ProfileRepository, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Profile repository held in memory
///
/// Used by tests and by embedders that already hold the read models.
#[derive(Default)]
pub struct InMemoryProfiles {
    talents: RwLock<BTreeMap<String, TalentProfile>>,
    startups: RwLock<BTreeMap<String, StartupPosting>>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_talent(&self, talent: TalentProfile) {
        self.talents.write().await.insert(talent.talent_id.clone(), talent);
    }

    pub async fn put_startup(&self, startup: StartupPosting) {
        self.startups.write().await.insert(startup.startup_id.clone(), startup);
    }

    pub async fn remove_talent(&self, talent_id: &str) -> Option<TalentProfile> {
        self.talents.write().await.remove(talent_id)
    }

    pub async fn remove_startup(&self, startup_id: &str) -> Option<StartupPosting> {
        self.startups.write().await.remove(startup_id)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfiles {
    async fn get_talent(&self, talent_id: &str) -> Result<TalentProfile, StoreError> {
        self.talents
            .read()
            .await
            .get(talent_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("talent {}", talent_id)))
    }

    async fn get_startup(&self, startup_id: &str) -> Result<StartupPosting, StoreError> {
        self.startups
            .read()
            .await
            .get(startup_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("startup {}", startup_id)))
    }

    async fn get_talents(&self, talent_ids: &[String]) -> Result<Vec<TalentProfile>, StoreError> {
        let talents = self.talents.read().await;
        Ok(talent_ids.iter().filter_map(|id| talents.get(id).cloned()).collect())
    }

    async fn get_startups(&self, startup_ids: &[String]) -> Result<Vec<StartupPosting>, StoreError> {
        let startups = self.startups.read().await;
        Ok(startup_ids.iter().filter_map(|id| startups.get(id).cloned()).collect())
    }

    async fn startups_for_founder(&self, founder_id: &str) -> Result<Vec<StartupPosting>, StoreError> {
        Ok(self
            .startups
            .read()
            .await
            .values()
            .filter(|s| s.founder_id == founder_id)
            .cloned()
            .collect())
    }

    async fn talent_candidates(&self, scope: &CandidateScope) -> Result<Vec<TalentProfile>, StoreError> {
        Ok(self
            .talents
            .read()
            .await
            .values()
            .filter(|t| talent_in_scope(t, scope))
            .take(scope.limit)
            .cloned()
            .collect())
    }

    async fn startup_candidates(&self, scope: &CandidateScope) -> Result<Vec<StartupPosting>, StoreError> {
        Ok(self
            .startups
            .read()
            .await
            .values()
            .filter(|s| startup_in_scope(s, scope))
            .take(scope.limit)
            .cloned()
            .collect())
    }
}

/// Match store held in memory
///
/// Each operation runs under one write lock, which gives the same
/// guarantees as the unique index and versioned update in Postgres.
#[derive(Default)]
pub struct InMemoryMatchStore {
    records: RwLock<HashMap<PairKey, MatchRecord>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<MatchRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Seed a record as-is, replacing any existing one for the pair
    pub async fn seed(&self, record: MatchRecord) {
        self.records.write().await.insert(record.key(), record);
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn get(&self, key: &PairKey) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn insert(
        &self,
        pair: &PairScore,
        computed_at: DateTime<Utc>,
    ) -> Result<MatchRecord, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&pair.key) {
            return Err(StoreError::Conflict(pair.key.clone()));
        }
        let record = MatchRecord::from_pair(pair, computed_at);
        records.insert(pair.key.clone(), record.clone());
        Ok(record)
    }

    async fn update_if_version(
        &self,
        pair: &PairScore,
        expected_version: i64,
        computed_at: DateTime<Utc>,
    ) -> Result<Option<MatchRecord>, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&pair.key) {
            Some(record) if record.version == expected_version => {
                record.score = pair.score;
                record.breakdown = pair.breakdown;
                record.version += 1;
                record.updated_at = computed_at;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_for_talent(&self, talent_id: &str) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.talent_id == talent_id)
            .cloned()
            .collect())
    }

    async fn list_for_startups(&self, startup_ids: &[String]) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| startup_ids.contains(&r.startup_id))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreBreakdown;

    fn pair(talent: &str, startup: &str, score: u8) -> PairScore {
        PairScore {
            key: PairKey::new(talent, startup),
            score,
            breakdown: ScoreBreakdown { skill_points: score, industry_points: 0, stage_bonus: 0 },
        }
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_existing_pair() {
        let store = InMemoryMatchStore::new();
        let now = Utc::now();

        store.insert(&pair("t1", "s1", 10), now).await.unwrap();
        let err = store.insert(&pair("t1", "s1", 20), now).await.unwrap_err();

        assert_eq!(err, StoreError::Conflict(PairKey::new("t1", "s1")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_requires_matching_version() {
        let store = InMemoryMatchStore::new();
        let now = Utc::now();
        let created = store.insert(&pair("t1", "s1", 10), now).await.unwrap();

        let stale = store.update_if_version(&pair("t1", "s1", 30), created.version + 1, now).await.unwrap();
        assert!(stale.is_none());

        let updated = store
            .update_if_version(&pair("t1", "s1", 30), created.version, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.score, 30);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.id, created.id);
    }

    #[tokio::test]
    async fn test_lists_filter_by_side() {
        let store = InMemoryMatchStore::new();
        let now = Utc::now();
        store.insert(&pair("t1", "s1", 10), now).await.unwrap();
        store.insert(&pair("t1", "s2", 10), now).await.unwrap();
        store.insert(&pair("t2", "s2", 10), now).await.unwrap();

        assert_eq!(store.list_for_talent("t1").await.unwrap().len(), 2);
        assert_eq!(store.list_for_startups(&["s2".to_string()]).await.unwrap().len(), 2);
        assert!(store.list_for_talent("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let profiles = InMemoryProfiles::new();
        let err = profiles.get_talent("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
