use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Talent availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    FullTime,
    PartTime,
    Consulting,
    NotAvailable,
}

/// Kind of engagement a talent is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Cofounder,
    Employee,
    Contractor,
    Advisor,
}

/// Industry category of a startup posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Industry {
    Technology,
    Healthcare,
    Finance,
    Education,
    #[serde(rename = "E-commerce")]
    Ecommerce,
    Sustainability,
    Media,
    #[serde(rename = "Real Estate")]
    RealEstate,
    #[serde(rename = "Food & Beverage")]
    FoodBeverage,
    Other,
}

impl Industry {
    pub const ALL: [Industry; 10] = [
        Industry::Technology,
        Industry::Healthcare,
        Industry::Finance,
        Industry::Education,
        Industry::Ecommerce,
        Industry::Sustainability,
        Industry::Media,
        Industry::RealEstate,
        Industry::FoodBeverage,
        Industry::Other,
    ];

    /// Name as shown to users and stored in the backend
    pub fn display_name(&self) -> &'static str {
        match self {
            Industry::Technology => "Technology",
            Industry::Healthcare => "Healthcare",
            Industry::Finance => "Finance",
            Industry::Education => "Education",
            Industry::Ecommerce => "E-commerce",
            Industry::Sustainability => "Sustainability",
            Industry::Media => "Media",
            Industry::RealEstate => "Real Estate",
            Industry::FoodBeverage => "Food & Beverage",
            Industry::Other => "Other",
        }
    }
}

/// Startup maturity, ordered from earliest to latest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idea,
    Mvp,
    EarlyStage,
    Growth,
    Scaling,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Idea,
        Stage::Mvp,
        Stage::EarlyStage,
        Stage::Growth,
        Stage::Scaling,
    ];
}

/// Talent profile read model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TalentProfile {
    #[serde(rename = "talentId")]
    pub talent_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub availability: Availability,
    pub commitment: Commitment,
    #[serde(default)]
    pub bio: String,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Startup posting read model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupPosting {
    #[serde(rename = "startupId")]
    pub startup_id: String,
    #[serde(rename = "founderId")]
    pub founder_id: String,
    pub name: String,
    pub industry: Industry,
    pub stage: Stage,
    #[serde(rename = "skillsNeeded", alias = "skills_needed", default)]
    pub skills_needed: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Per-factor points behind a match score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(rename = "skillPoints")]
    pub skill_points: u8,
    #[serde(rename = "industryPoints")]
    pub industry_points: u8,
    #[serde(rename = "stageBonus")]
    pub stage_bonus: u8,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        let sum = self.skill_points as u16 + self.industry_points as u16 + self.stage_bonus as u16;
        sum.min(100) as u8
    }
}

/// Output of the scoring function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub score: u8,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
}

/// Composite identity of a match record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    #[serde(rename = "talentId")]
    pub talent_id: String,
    #[serde(rename = "startupId")]
    pub startup_id: String,
}

impl PairKey {
    pub fn new(talent_id: impl Into<String>, startup_id: impl Into<String>) -> Self {
        Self {
            talent_id: talent_id.into(),
            startup_id: startup_id.into(),
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.talent_id, self.startup_id)
    }
}

/// Freshly computed score for one pair, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairScore {
    #[serde(flatten)]
    pub key: PairKey,
    pub score: u8,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
}

/// Persisted match for one (talent, startup) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    #[serde(rename = "startupId")]
    pub startup_id: String,
    #[serde(rename = "talentId")]
    pub talent_id: String,
    pub score: u8,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
    pub version: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Last time the score was computed and written
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    /// New record at version 1 for a freshly scored pair
    pub fn from_pair(pair: &PairScore, computed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            startup_id: pair.key.startup_id.clone(),
            talent_id: pair.key.talent_id.clone(),
            score: pair.score,
            breakdown: pair.breakdown,
            version: 1,
            created_at: computed_at,
            updated_at: computed_at,
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(&self.talent_id, &self.startup_id)
    }

    /// Whether this record already holds exactly the given computation
    pub fn holds(&self, pair: &PairScore) -> bool {
        self.score == pair.score && self.breakdown == pair.breakdown
    }
}

/// Which side of the marketplace a change event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Talent,
    Startup,
}

/// Change notification emitted by the backend's change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "entityType")]
    pub entity_type: EntityType,
    pub id: String,
    #[serde(rename = "changedFields", default)]
    pub changed_fields: Vec<String>,
}

/// Role of the caller, as issued by the auth provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerRole {
    Talent,
    Founder,
    /// Backend functions and webhooks acting on behalf of the system
    Service,
}

/// Explicit caller context passed into every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    #[serde(rename = "viewerId")]
    pub viewer_id: String,
    pub role: ViewerRole,
}

/// Candidate query used to scope recompute fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateScope {
    /// Normalized skill tags; candidates sharing any of them qualify
    pub skills: Vec<String>,
    /// The same tags in their source casing, for backends that compare
    /// array elements exactly
    pub skill_tags: Vec<String>,
    /// Industries of interest; startup candidates in any of them qualify
    pub industries: Vec<Industry>,
    pub exclude_ids: Vec<String>,
    pub limit: usize,
}

/// Stage bonus points per startup stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBonusTable {
    pub idea: u8,
    pub mvp: u8,
    pub early_stage: u8,
    pub growth: u8,
    pub scaling: u8,
}

impl StageBonusTable {
    pub fn bonus(&self, stage: Stage) -> u8 {
        match stage {
            Stage::Idea => self.idea,
            Stage::Mvp => self.mvp,
            Stage::EarlyStage => self.early_stage,
            Stage::Growth => self.growth,
            Stage::Scaling => self.scaling,
        }
    }
}

impl Default for StageBonusTable {
    fn default() -> Self {
        Self {
            idea: 20,
            mvp: 15,
            early_stage: 10,
            growth: 5,
            scaling: 0,
        }
    }
}

/// Scoring policy constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoringPolicy {
    pub stage_bonus: StageBonusTable,
}

/// A ranked match as seen by a talent: the record joined with the current posting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupMatch {
    #[serde(rename = "match")]
    pub record: MatchRecord,
    pub startup: StartupPosting,
}

/// A ranked match as seen by a founder: the record joined with the current profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TalentMatch {
    #[serde(rename = "match")]
    pub record: MatchRecord,
    pub talent: TalentProfile,
}

/// Founder view bucket: one startup and its ranked talent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupMatchGroup {
    pub startup: StartupPosting,
    pub matches: Vec<TalentMatch>,
}
