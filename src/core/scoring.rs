use crate::models::{MatchScore, ScoreBreakdown, ScoringPolicy, StartupPosting, TalentProfile};
use crate::core::{filters::skill_set, industry::industry_signal};

/// Maximum points for skill alignment
pub const SKILL_MAX_POINTS: u8 = 50;
/// Maximum points for the stage bonus
pub const STAGE_MAX_POINTS: u8 = 20;

/// Calculate a match score (0-100) for a talent against a startup posting
///
/// Scoring formula:
/// score = (
///     skill_points        # 0-50, overlap / larger skill set
///   + industry_points     # 0-30, industry keyword signal in bio/skills
///   + stage_bonus         # 0-20, earlier stages score higher
/// )
///
/// Pure and deterministic: identical inputs always give identical output.
pub fn calculate_match_score(
    talent: &TalentProfile,
    startup: &StartupPosting,
    policy: &ScoringPolicy,
) -> MatchScore {
    let skill_points = calculate_skill_points(&talent.skills, &startup.skills_needed);
    let industry_points = industry_signal(talent, startup.industry).points();
    let stage_bonus = policy.stage_bonus.bonus(startup.stage).min(STAGE_MAX_POINTS);

    let breakdown = ScoreBreakdown {
        skill_points,
        industry_points,
        stage_bonus,
    };

    MatchScore {
        score: breakdown.total(),
        breakdown,
    }
}

/// Skill alignment points (0-50)
///
/// Proportional to the intersection size, normalized by the larger of the
/// two sets. An empty set on either side scores zero.
#[inline]
pub fn calculate_skill_points(talent_skills: &[String], wanted_skills: &[String]) -> u8 {
    let have = skill_set(talent_skills);
    let want = skill_set(wanted_skills);

    if have.is_empty() || want.is_empty() {
        return 0;
    }

    let overlap = have.intersection(&want).count() as u32;
    let denominator = have.len().max(want.len()) as u32;

    // Integer half-up rounding of 50 * overlap / denominator
    let points = (SKILL_MAX_POINTS as u32 * overlap * 2 + denominator) / (denominator * 2);
    points.min(SKILL_MAX_POINTS as u32) as u8
}
