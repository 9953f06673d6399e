use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to recompute an explicit set of talent/startup pairs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecomputeRequest {
    #[validate(length(min = 1, max = 200))]
    #[serde(alias = "talent_ids", rename = "talentIds")]
    pub talent_ids: Vec<String>,
    #[validate(length(min = 1, max = 200))]
    #[serde(alias = "startup_ids", rename = "startupIds")]
    pub startup_ids: Vec<String>,
}

/// Query string for the ranked list endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ListMatchesQuery {
    #[validate(range(min = 1))]
    pub limit: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recompute_request_requires_ids() {
        let req: RecomputeRequest =
            serde_json::from_str(r#"{"talentIds": [], "startupIds": ["s1"]}"#).unwrap();
        assert!(req.validate().is_err());

        let req: RecomputeRequest =
            serde_json::from_str(r#"{"talent_ids": ["t1"], "startupIds": ["s1"]}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let query = ListMatchesQuery { limit: Some(0) };
        assert!(query.validate().is_err());
        assert!(ListMatchesQuery::default().validate().is_ok());
    }
}
