use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seniority of a posting or of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Internship,
    Graduate,
    #[serde(alias = "entry-level", alias = "entry level", alias = "entry")]
    EntryLevel,
    Junior,
    #[serde(alias = "mid", alias = "mid-level")]
    MidLevel,
    Senior,
    Lead,
    Director,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ExperienceLevel {
    /// Levels that must never be shown senior roles
    pub fn is_entry_level(self) -> bool {
        matches!(
            self,
            Self::Internship | Self::Graduate | Self::EntryLevel | Self::Junior
        )
    }

    pub fn is_senior(self) -> bool {
        matches!(self, Self::Senior | Self::Lead | Self::Director)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkEnvironment {
    #[serde(alias = "office", alias = "onsite", alias = "on-site")]
    OnSite,
    Hybrid,
    Remote,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Recency bucket assigned by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessTier {
    UltraFresh,
    Fresh,
    Recent,
    Stale,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FreshnessTier {
    /// Graded freshness factor (0.0 to 1.0)
    pub fn factor(self) -> f64 {
        match self {
            Self::UltraFresh => 1.0,
            Self::Fresh => 0.8,
            Self::Recent => 0.5,
            Self::Stale => 0.2,
            Self::Unknown => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.write_str("free"),
            Self::Premium => f.write_str("premium"),
        }
    }
}

/// Job posting as delivered by the collector pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_hash: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub work_environment: WorkEnvironment,
    #[serde(default)]
    pub visa_friendly: bool,
    #[serde(default)]
    pub language_requirements: Vec<String>,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub freshness_tier: FreshnessTier,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Subscriber profile and preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub target_cities: Vec<String>,
    #[serde(default)]
    pub languages_spoken: Vec<String>,
    #[serde(default)]
    pub visa_status: String,
    #[serde(default)]
    pub career_path: Vec<String>,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
}

impl UserProfile {
    /// Whether the free-text visa status says the user needs sponsorship
    pub fn requires_sponsorship(&self) -> bool {
        let status = self.visa_status.to_lowercase();
        if status.is_empty() {
            return false;
        }

        let negated = [
            "no sponsorship",
            "not require",
            "doesn't require",
            "does not require",
            "don't need",
            "do not need",
            "not needed",
        ]
        .iter()
        .any(|n| status.contains(n));
        if negated {
            return false;
        }

        status.contains("sponsor")
            || status.contains("requires visa")
            || status.contains("need visa")
            || status.contains("needs visa")
    }
}

/// How a match result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Ai,
    Semantic,
    RuleBased,
    Cached,
    None,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ai => "ai",
            Self::Semantic => "semantic",
            Self::RuleBased => "rule_based",
            Self::Cached => "cached",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Scoring strategy, tried in configured priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Ai,
    Semantic,
    RuleBased,
}

impl Tier {
    pub fn method(self) -> MatchMethod {
        match self {
            Self::Ai => MatchMethod::Ai,
            Self::Semantic => MatchMethod::Semantic,
            Self::RuleBased => MatchMethod::RuleBased,
        }
    }

    /// Baseline confidence disclosed for results of this tier
    pub fn base_confidence(self) -> f64 {
        match self {
            Self::Ai => 0.9,
            Self::Semantic => 0.75,
            Self::RuleBased => 0.6,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.method().fmt(f)
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ai" => Ok(Self::Ai),
            "semantic" => Ok(Self::Semantic),
            "rule_based" | "rule-based" | "rules" => Ok(Self::RuleBased),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Final, validated match delivered to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub job_hash: String,
    pub user_email: String,
    pub match_score: f64,
    pub match_reason: String,
    pub method: MatchMethod,
    pub confidence: f64,
    pub matched_at: DateTime<Utc>,
}

/// Candidate pool snapshot with the identifier used for cache keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePool {
    pub version: String,
    pub jobs: Vec<JobPosting>,
}

impl CandidatePool {
    pub fn new(version: impl Into<String>, jobs: Vec<JobPosting>) -> Self {
        Self {
            version: version.into(),
            jobs,
        }
    }
}

/// Scoring weights for the rule-based tier, in score points (sum to 100)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub city: f64,
    pub career_path: f64,
    pub visa: f64,
    pub language: f64,
    pub freshness: f64,
    pub level: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            city: 25.0,
            career_path: 25.0,
            visa: 10.0,
            language: 10.0,
            freshness: 15.0,
            level: 15.0,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.city + self.career_path + self.visa + self.language + self.freshness + self.level
    }
}
