// Core algorithm exports
pub mod filters;
pub mod industry;
pub mod matcher;
pub mod scoring;

pub use filters::{is_relevant_pair, scope_for_startup, scope_for_talent, shared_skills};
pub use industry::{industry_signal, signaled_industries};
pub use matcher::{rank_for_founder, rank_for_talent, Matcher};
pub use scoring::{calculate_match_score, calculate_skill_points};
