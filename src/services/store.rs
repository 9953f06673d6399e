//! Storage seams of the engine.
//!
//! [`ProfileRepository`] is the read side owned by the backend (talent
//! profiles and startup postings). [`MatchStore`] holds the persisted match
//! records and is only written by the synchronizer.

use crate::models::{
    CandidateScope, EntityType, MatchRecord, PairKey, PairScore, StartupPosting, TalentProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by any store implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record for the pair already exists (unique constraint violation)
    #[error("Match record already exists for {0}")]
    Conflict(PairKey),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Transient failures worth retrying after a backoff delay
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Read access to talent profiles and startup postings
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_talent(&self, talent_id: &str) -> Result<TalentProfile, StoreError>;

    async fn get_startup(&self, startup_id: &str) -> Result<StartupPosting, StoreError>;

    /// Bulk fetch; ids that do not exist are left out of the result
    async fn get_talents(&self, talent_ids: &[String]) -> Result<Vec<TalentProfile>, StoreError>;

    /// Bulk fetch; ids that do not exist are left out of the result
    async fn get_startups(&self, startup_ids: &[String]) -> Result<Vec<StartupPosting>, StoreError>;

    async fn startups_for_founder(&self, founder_id: &str) -> Result<Vec<StartupPosting>, StoreError>;

    /// Talents sharing a scope skill or signaling a scope industry
    async fn talent_candidates(&self, scope: &CandidateScope) -> Result<Vec<TalentProfile>, StoreError>;

    /// Startups in a scope industry or seeking a scope skill
    async fn startup_candidates(&self, scope: &CandidateScope) -> Result<Vec<StartupPosting>, StoreError>;

    /// Drop any cached copy of an entity after it changed upstream
    async fn invalidate(&self, _entity_type: EntityType, _id: &str) {}
}

/// Persistence for match records, keyed by (talent, startup)
///
/// Every method is a single atomic operation on the backing store.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get(&self, key: &PairKey) -> Result<Option<MatchRecord>, StoreError>;

    /// Create a record at version 1
    ///
    /// Fails with [`StoreError::Conflict`] when the pair already has one.
    async fn insert(
        &self,
        pair: &PairScore,
        computed_at: DateTime<Utc>,
    ) -> Result<MatchRecord, StoreError>;

    /// Overwrite score, breakdown and `updated_at` if the stored version
    /// still equals `expected_version`
    ///
    /// Returns `Ok(None)` when the record moved on or disappeared.
    async fn update_if_version(
        &self,
        pair: &PairScore,
        expected_version: i64,
        computed_at: DateTime<Utc>,
    ) -> Result<Option<MatchRecord>, StoreError>;

    async fn list_for_talent(&self, talent_id: &str) -> Result<Vec<MatchRecord>, StoreError>;

    async fn list_for_startups(&self, startup_ids: &[String]) -> Result<Vec<MatchRecord>, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}
