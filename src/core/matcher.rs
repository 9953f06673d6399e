use crate::models::{
    MatchRecord, MatchScore, PairKey, PairScore, ScoringPolicy, StartupPosting, TalentProfile,
};
use crate::core::{filters::is_relevant_pair, scoring::calculate_match_score};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Main scoring orchestrator
///
/// Holds the scoring policy and turns talent/startup read models into
/// pair scores ready for the synchronizer.
#[derive(Debug, Clone)]
pub struct Matcher {
    policy: ScoringPolicy,
}

impl Matcher {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn with_default_policy() -> Self {
        Self {
            policy: ScoringPolicy::default(),
        }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score a single pair
    #[inline]
    pub fn score(&self, talent: &TalentProfile, startup: &StartupPosting) -> MatchScore {
        calculate_match_score(talent, startup, &self.policy)
    }

    /// Score one pair into a synchronizer input
    pub fn score_pair(&self, talent: &TalentProfile, startup: &StartupPosting) -> PairScore {
        let result = self.score(talent, startup);
        PairScore {
            key: PairKey::new(&talent.talent_id, &startup.startup_id),
            score: result.score,
            breakdown: result.breakdown,
        }
    }

    /// Score the full cross product of the given talents and startups
    ///
    /// Every pair is scored, including pairs that end up at zero.
    pub fn score_pairs(
        &self,
        talents: &[TalentProfile],
        startups: &[StartupPosting],
    ) -> Vec<PairScore> {
        talents
            .iter()
            .flat_map(|talent| startups.iter().map(move |startup| (talent, startup)))
            .map(|(talent, startup)| self.score_pair(talent, startup))
            .collect()
    }

    /// Score a talent against fan-out candidates, skipping irrelevant ones
    ///
    /// Startups in `matched` already hold a record with this talent and are
    /// always rescored, relevant or not.
    pub fn score_startup_candidates(
        &self,
        talent: &TalentProfile,
        candidates: &[StartupPosting],
        matched: &BTreeSet<String>,
    ) -> Vec<PairScore> {
        candidates
            .iter()
            .filter(|startup| matched.contains(&startup.startup_id) || is_relevant_pair(talent, startup))
            .map(|startup| self.score_pair(talent, startup))
            .collect()
    }

    /// Score a startup against fan-out candidates, skipping irrelevant ones
    ///
    /// Talents in `matched` are always rescored.
    pub fn score_talent_candidates(
        &self,
        startup: &StartupPosting,
        candidates: &[TalentProfile],
        matched: &BTreeSet<String>,
    ) -> Vec<PairScore> {
        candidates
            .iter()
            .filter(|talent| matched.contains(&talent.talent_id) || is_relevant_pair(talent, startup))
            .map(|talent| self.score_pair(talent, startup))
            .collect()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_policy()
    }
}

/// Ranking order for match records
///
/// Score descending, then most recently computed first, then the
/// counterpart id ascending so equal records never fall back to storage
/// order.
pub fn rank_order(a: &MatchRecord, b: &MatchRecord, counterpart: fn(&MatchRecord) -> &str) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| counterpart(a).cmp(counterpart(b)))
}

/// Sort records for a talent's view (counterpart = startup)
pub fn rank_for_talent(records: &mut [MatchRecord]) {
    records.sort_by(|a, b| rank_order(a, b, |r| r.startup_id.as_str()));
}

/// Sort records for a founder's view (counterpart = talent, then startup)
pub fn rank_for_founder(records: &mut [MatchRecord]) {
    records.sort_by(|a, b| {
        rank_order(a, b, |r| r.talent_id.as_str())
            .then_with(|| a.startup_id.cmp(&b.startup_id))
    });
}
