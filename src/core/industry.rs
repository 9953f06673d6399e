//! Keyword-to-industry table used for the industry relevance factor.
//!
//! Keywords are lowercase. Multi-word keywords match on whole-word
//! boundaries against the normalized bio. `Other` carries no keywords and
//! is never signaled.

use crate::models::{Industry, TalentProfile};
use std::collections::BTreeSet;

/// Points awarded when the talent clearly signals the industry
pub const INDUSTRY_FULL_POINTS: u8 = 30;
/// Points awarded for a single weak signal
pub const INDUSTRY_PARTIAL_POINTS: u8 = 15;

pub(crate) const INDUSTRY_KEYWORDS: &[(Industry, &[&str])] = &[
    (
        Industry::Technology,
        &[
            "tech", "software", "saas", "cloud", "developer", "engineering", "engineer",
            "machine learning", "ai", "devops", "web", "mobile", "startup", "react",
            "node.js", "python", "rust", "javascript", "typescript", "kubernetes",
        ],
    ),
    (
        Industry::Healthcare,
        &[
            "health", "medical", "medicine", "clinical", "biotech", "pharma", "hospital",
            "patient", "wellness", "nursing", "telehealth",
        ],
    ),
    (
        Industry::Finance,
        &[
            "fintech", "finance", "financial", "banking", "payments", "trading", "investment",
            "accounting", "insurance", "crypto", "blockchain",
        ],
    ),
    (
        Industry::Education,
        &[
            "edtech", "education", "teaching", "teacher", "learning", "curriculum", "tutoring",
            "university", "school", "training",
        ],
    ),
    (
        Industry::Ecommerce,
        &[
            "ecommerce", "e-commerce", "retail", "marketplace", "shopify", "dropshipping",
            "merchandising", "logistics", "checkout",
        ],
    ),
    (
        Industry::Sustainability,
        &[
            "climate", "cleantech", "renewable", "solar", "energy", "carbon", "sustainable",
            "recycling", "environmental", "greentech",
        ],
    ),
    (
        Industry::Media,
        &[
            "media", "content", "journalism", "video", "film", "music", "gaming", "publishing",
            "social media", "podcast", "marketing",
        ],
    ),
    (
        Industry::RealEstate,
        &[
            "proptech", "property", "properties", "construction", "architecture", "mortgage",
            "leasing", "housing", "real-estate",
        ],
    ),
    (
        Industry::FoodBeverage,
        &[
            "food", "beverage", "restaurant", "culinary", "chef", "nutrition", "agriculture",
            "foodtech", "hospitality",
        ],
    ),
    (Industry::Other, &[]),
];

/// Keywords associated with an industry
pub fn keywords_for(industry: Industry) -> &'static [&'static str] {
    INDUSTRY_KEYWORDS
        .iter()
        .find(|(i, _)| *i == industry)
        .map(|(_, kws)| *kws)
        .unwrap_or(&[])
}

/// Normalize free text into lowercase tokens joined by single spaces
///
/// Punctuation is trimmed from token edges; `.`, `+`, `#` and `-` inside a
/// token are kept so tags like `node.js` or `c++` survive.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `phrase` occurs in `normalized` on word boundaries
fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", normalized);
    haystack.contains(&format!(" {} ", phrase))
}

/// Evidence that a talent is interested in an industry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndustrySignal {
    pub named: bool,
    pub keywords: BTreeSet<&'static str>,
}

impl IndustrySignal {
    pub fn points(&self) -> u8 {
        if self.named || self.keywords.len() >= 2 {
            INDUSTRY_FULL_POINTS
        } else if self.keywords.len() == 1 {
            INDUSTRY_PARTIAL_POINTS
        } else {
            0
        }
    }

    pub fn is_present(&self) -> bool {
        self.named || !self.keywords.is_empty()
    }
}

/// Collect the industry signal present in a talent's bio and skills
pub fn industry_signal(talent: &TalentProfile, industry: Industry) -> IndustrySignal {
    let bio = normalize_text(&talent.bio);
    let skills: Vec<String> = talent.skills.iter().map(|s| normalize_text(s)).collect();

    // "other" is too common a word to count as a signal
    let named = industry != Industry::Other
        && contains_phrase(&bio, &normalize_text(industry.display_name()));

    let keywords = keywords_for(industry)
        .iter()
        .copied()
        .filter(|kw| contains_phrase(&bio, kw) || skills.iter().any(|s| s == kw))
        .collect();

    IndustrySignal { named, keywords }
}

/// Industries the talent shows any signal for
pub fn signaled_industries(talent: &TalentProfile) -> Vec<Industry> {
    Industry::ALL
        .iter()
        .copied()
        .filter(|industry| industry_signal(talent, *industry).is_present())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Availability, Commitment};

    fn talent(skills: &[&str], bio: &str) -> TalentProfile {
        TalentProfile {
            talent_id: "t".to_string(),
            name: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            availability: Availability::FullTime,
            commitment: Commitment::Cofounder,
            bio: bio.to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Loves Node.js, C++ and (Rust)! "), "loves node.js c++ and rust");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_named_industry_is_full_points() {
        let t = talent(&[], "Ten years in Technology leadership");
        assert_eq!(industry_signal(&t, Industry::Technology).points(), 30);
    }

    #[test]
    fn test_multi_word_display_name() {
        let t = talent(&[], "I flip houses in real estate.");
        let signal = industry_signal(&t, Industry::RealEstate);
        assert!(signal.named);
        assert_eq!(signal.points(), 30);
    }

    #[test]
    fn test_single_keyword_is_partial() {
        let t = talent(&["Payments"], "Backend person");
        assert_eq!(industry_signal(&t, Industry::Finance).points(), 15);
    }

    #[test]
    fn test_two_keywords_are_full() {
        let t = talent(&[], "Built banking and trading systems");
        assert_eq!(industry_signal(&t, Industry::Finance).points(), 30);
    }

    #[test]
    fn test_keyword_requires_word_boundary() {
        // "aid" must not match the "ai" keyword
        let t = talent(&[], "First aid volunteer");
        assert_eq!(industry_signal(&t, Industry::Technology).points(), 0);
    }

    #[test]
    fn test_other_never_signals() {
        assert!(keywords_for(Industry::Other).is_empty());
        let t = talent(&["rust"], "rust and other things");
        assert_eq!(industry_signal(&t, Industry::Other).points(), 0);
    }

    #[test]
    fn test_signaled_industries() {
        let t = talent(&["React"], "climate nerd");
        let industries = signaled_industries(&t);
        assert!(industries.contains(&Industry::Technology));
        assert!(industries.contains(&Industry::Sustainability));
        assert!(!industries.contains(&Industry::Healthcare));
    }
}
