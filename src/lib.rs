//! Founder Match - match scoring and ranking engine
//!
//! Scores (talent, startup) pairs on skill overlap, industry relevance and
//! startup stage, keeps one persisted match record per pair, and serves
//! ranked match lists to talents and founders.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{calculate_match_score, Matcher};
pub use engine::{MatchSynchronizer, RankedQueryService, RecomputeTrigger, SyncPolicy};
pub use error::EngineError;
pub use models::{
    ChangeEvent, MatchRecord, MatchScore, PairScore, RecomputeReport, ScoringPolicy,
    StartupPosting, TalentProfile, Viewer,
};
pub use services::{MatchStore, ProfileRepository, StoreError};
