use crate::models::{CandidateScope, StartupPosting, TalentProfile};
use crate::core::industry::{industry_signal, signaled_industries};
use std::collections::BTreeSet;

/// Normalize a skill tag for exact, case-insensitive comparison
#[inline]
pub fn normalize_skill(skill: &str) -> String {
    skill.trim().to_lowercase()
}

/// Normalized, de-duplicated skill set
pub fn skill_set(skills: &[String]) -> BTreeSet<String> {
    skills
        .iter()
        .map(|s| normalize_skill(s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Trimmed tags in their source casing, first occurrence of each kept
pub fn source_tags(skills: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(normalize_skill(s)))
        .map(str::to_string)
        .collect()
}

/// Skills present on both sides, normalized
pub fn shared_skills(talent: &TalentProfile, startup: &StartupPosting) -> Vec<String> {
    let wanted = skill_set(&startup.skills_needed);
    skill_set(&talent.skills)
        .into_iter()
        .filter(|s| wanted.contains(s))
        .collect()
}

/// Whether a pair is worth scoring during fan-out
///
/// A pair qualifies when the talent has at least one sought skill or shows
/// any signal for the startup's industry. Explicit recompute requests skip
/// this check.
#[inline]
pub fn is_relevant_pair(talent: &TalentProfile, startup: &StartupPosting) -> bool {
    !shared_skills(talent, startup).is_empty()
        || industry_signal(talent, startup.industry).is_present()
}

/// Candidate query for startups that may match a talent
pub fn scope_for_talent(talent: &TalentProfile, limit: usize) -> CandidateScope {
    CandidateScope {
        skills: skill_set(&talent.skills).into_iter().collect(),
        skill_tags: source_tags(&talent.skills),
        industries: signaled_industries(talent),
        exclude_ids: Vec::new(),
        limit,
    }
}

/// Candidate query for talents that may match a startup
pub fn scope_for_startup(startup: &StartupPosting, limit: usize) -> CandidateScope {
    CandidateScope {
        skills: skill_set(&startup.skills_needed).into_iter().collect(),
        skill_tags: source_tags(&startup.skills_needed),
        industries: vec![startup.industry],
        exclude_ids: Vec::new(),
        limit,
    }
}

/// In-memory evaluation of a scope against a talent
///
/// Mirrors what the backend query does so stores without server-side
/// filtering (and tests) behave the same way.
pub fn talent_in_scope(talent: &TalentProfile, scope: &CandidateScope) -> bool {
    if scope.exclude_ids.contains(&talent.talent_id) {
        return false;
    }
    let skills = skill_set(&talent.skills);
    if scope.skills.iter().any(|s| skills.contains(s)) {
        return true;
    }
    scope
        .industries
        .iter()
        .any(|industry| industry_signal(talent, *industry).is_present())
}

/// In-memory evaluation of a scope against a startup
pub fn startup_in_scope(startup: &StartupPosting, scope: &CandidateScope) -> bool {
    if scope.exclude_ids.contains(&startup.startup_id) {
        return false;
    }
    if scope.industries.contains(&startup.industry) {
        return true;
    }
    let skills = skill_set(&startup.skills_needed);
    scope.skills.iter().any(|s| skills.contains(s))
}
