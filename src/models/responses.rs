use serde::{Deserialize, Serialize};
use crate::error::EngineError;
use crate::models::domain::{PairKey, StartupMatch, StartupMatchGroup};

/// Ranked startups for a talent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentMatchesResponse {
    #[serde(rename = "talentId")]
    pub talent_id: String,
    pub matches: Vec<StartupMatch>,
    pub count: usize,
}

/// Ranked talent for a founder, grouped by startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FounderMatchesResponse {
    #[serde(rename = "founderId")]
    pub founder_id: String,
    pub groups: Vec<StartupMatchGroup>,
    pub count: usize,
}

/// What happened to one pair during a recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Created,
    Updated,
    Unchanged,
    Failed,
}

/// Per-pair result of a recompute or upsert batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairOutcome {
    #[serde(flatten)]
    pub key: PairKey,
    pub status: PairStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub retryable: bool,
}

/// Result of a recompute batch, one entry per pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub outcomes: Vec<PairOutcome>,
}

impl RecomputeReport {
    pub fn count(&self, status: PairStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(PairStatus::Failed) > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(|o| o.status == PairStatus::Failed)
    }

    pub fn outcome(&self, key: &PairKey) -> Option<&PairOutcome> {
        self.outcomes.iter().find(|o| &o.key == key)
    }

    /// Turn a report with any failed pair into `PartialBatchFailure`
    pub fn into_result(self) -> Result<Self, EngineError> {
        if self.has_failures() {
            Err(EngineError::PartialBatchFailure(self))
        } else {
            Ok(self)
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default)]
    pub retryable: bool,
}

/// Response for accepted change events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAcceptedResponse {
    pub accepted: bool,
}
