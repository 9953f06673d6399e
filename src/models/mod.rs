// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Availability, CandidateScope, ChangeEvent, Commitment, EntityType, Industry, MatchRecord,
    MatchScore, PairKey, PairScore, ScoreBreakdown, ScoringPolicy, Stage, StageBonusTable,
    StartupMatch, StartupMatchGroup, StartupPosting, TalentMatch, TalentProfile, Viewer,
    ViewerRole,
};
pub use requests::{ListMatchesQuery, RecomputeRequest};
pub use responses::{
    ErrorResponse, EventAcceptedResponse, FounderMatchesResponse, HealthResponse, PairOutcome,
    PairStatus, RecomputeReport, TalentMatchesResponse,
};
