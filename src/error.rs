use crate::models::{PairKey, RecomputeReport};
use crate::services::StoreError;
use thiserror::Error;

/// Errors reported by the match engine to its callers
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Malformed or unknown talent/startup identity
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Concurrent writers kept winning the race for this pair
    #[error("Conflict on {key} after {attempts} attempts")]
    Conflict { key: PairKey, attempts: u32 },

    /// Some pairs of a batch failed; the report lists every pair
    #[error("{} of {} pairs failed", .0.count(crate::models::PairStatus::Failed), .0.outcomes.len())]
    PartialBatchFailure(RecomputeReport),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_)
                | EngineError::Conflict { .. }
                | EngineError::PartialBatchFailure(_)
        )
    }

    /// Short machine-readable label for error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Input(_) => "invalid_input",
            EngineError::StoreUnavailable(_) => "store_unavailable",
            EngineError::Conflict { .. } => "conflict",
            EngineError::PartialBatchFailure(_) => "partial_batch_failure",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => EngineError::Input(format!("unknown {}", what)),
            StoreError::Unavailable(msg) => EngineError::StoreUnavailable(msg),
            StoreError::Conflict(key) => EngineError::Conflict { key, attempts: 1 },
            StoreError::InvalidData(msg) => EngineError::Store(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PairOutcome, PairStatus};

    #[test]
    fn test_store_error_mapping() {
        let err: EngineError = StoreError::NotFound("talent t1".to_string()).into();
        assert!(matches!(err, EngineError::Input(_)));
        assert!(!err.is_retryable());

        let err: EngineError = StoreError::Unavailable("timeout".to_string()).into();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "store_unavailable");
    }

    #[test]
    fn test_partial_batch_message() {
        let report = RecomputeReport {
            outcomes: vec![
                PairOutcome {
                    key: PairKey::new("t1", "s1"),
                    status: PairStatus::Created,
                    score: Some(10),
                    error: None,
                    retryable: false,
                },
                PairOutcome {
                    key: PairKey::new("t1", "s2"),
                    status: PairStatus::Failed,
                    score: None,
                    error: Some("down".to_string()),
                    retryable: true,
                },
            ],
        };

        let err = EngineError::PartialBatchFailure(report);
        assert_eq!(err.to_string(), "1 of 2 pairs failed");
    }
}
