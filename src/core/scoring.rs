use async_trait::async_trait;

use crate::core::scorer::{ScoreFailure, ScoredJob, Scorer};
use crate::models::{ExperienceLevel, JobPosting, ScoringWeights, Tier, UserProfile};

/// Which features of a posting lined up with the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatches {
    pub city: Option<String>,
    pub career_paths: Vec<String>,
    pub visa: bool,
    pub language: bool,
    pub fresh: bool,
    pub level: bool,
}

/// Calculate a rule-based score (0-100) for a posting
///
/// Scoring formula (weights in points, default total 100):
/// score = (
///     city_score * 25 +         # exact city match, 0.5 for partial
///     career_score * 25 +       # share of career paths found in categories/title
///     visa_score * 10 +         # visa friendly when sponsorship is needed
///     language_score * 10 +     # all required languages spoken
///     freshness_score * 15 +    # freshness tier factor
///     level_score * 15          # internship/graduate alignment
/// )
pub fn calculate_rule_score(
    user: &UserProfile,
    job: &JobPosting,
    weights: &ScoringWeights,
) -> (f64, FeatureMatches) {
    let mut features = FeatureMatches::default();

    let (city_score, matched_city) = calculate_city_score(user, job);
    features.city = matched_city;

    let (career_score, shared_paths) = calculate_career_score(user, job);
    features.career_paths = shared_paths;

    let visa_score = if user.requires_sponsorship() {
        if job.visa_friendly { 1.0 } else { 0.0 }
    } else {
        // Nothing to satisfy, neutral credit
        0.5
    };
    features.visa = user.requires_sponsorship() && job.visa_friendly;

    let language_score = if super::filters::matches_languages(user, job) { 1.0 } else { 0.0 };
    features.language = language_score > 0.0 && !job.language_requirements.is_empty();

    let freshness_score = job.freshness_tier.factor();
    features.fresh = freshness_score >= 0.8;

    let level_score = calculate_level_score(user.experience_level, job.experience_level);
    features.level = level_score >= 1.0;

    let total_score = city_score * weights.city
        + career_score * weights.career_path
        + visa_score * weights.visa
        + language_score * weights.language
        + freshness_score * weights.freshness
        + level_score * weights.level;

    // Rescale in case configured weights do not sum to 100
    let total_weight = weights.total();
    let normalized = if total_weight > 0.0 {
        total_score * 100.0 / total_weight
    } else {
        0.0
    };

    (normalized.clamp(0.0, 100.0), features)
}

/// City score (0-1): exact city name 1.0, city containing the target 0.5
#[inline]
fn calculate_city_score(user: &UserProfile, job: &JobPosting) -> (f64, Option<String>) {
    let city = job.city.trim().to_lowercase();
    let mut best = (0.0, None);

    for target in &user.target_cities {
        let t = target.trim().to_lowercase();
        if t.is_empty() {
            continue;
        }
        if t == city {
            return (1.0, Some(job.city.clone()));
        }
        if !city.is_empty() && city.contains(&t) {
            best = (0.5, Some(job.city.clone()));
        }
    }

    best
}

/// Career score (0-1): share of the user's career paths that appear in the
/// posting's categories (full credit) or title (half credit)
#[inline]
fn calculate_career_score(user: &UserProfile, job: &JobPosting) -> (f64, Vec<String>) {
    if user.career_path.is_empty() {
        return (0.0, Vec::new());
    }

    let categories: Vec<String> = job.categories.iter().map(|c| c.to_lowercase()).collect();
    let title = job.title.to_lowercase();

    let mut shared = Vec::new();
    let mut credit = 0.0;
    for path in &user.career_path {
        let p = path.trim().to_lowercase();
        if p.is_empty() {
            continue;
        }
        if categories.iter().any(|c| c.contains(&p) || p.contains(c.as_str())) {
            credit += 1.0;
            shared.push(path.clone());
        } else if title.contains(&p) {
            credit += 0.5;
            shared.push(path.clone());
        }
    }

    ((credit / user.career_path.len() as f64).min(1.0), shared)
}

/// Level score (0-1): how well the posting's level fits the user's
#[inline]
fn calculate_level_score(user: ExperienceLevel, job: ExperienceLevel) -> f64 {
    use ExperienceLevel::*;

    match (user, job) {
        (_, Unknown) | (Unknown, _) => 0.5,
        (u, j) if u == j => 1.0,
        (Graduate, EntryLevel) | (EntryLevel, Graduate) | (Junior, EntryLevel) | (EntryLevel, Junior) => 1.0,
        (Internship, Graduate) | (Graduate, Internship) | (Graduate, Junior) | (Junior, Graduate) => 0.6,
        (Internship, _) => 0.2,
        (MidLevel, Junior) | (MidLevel, Senior) | (Senior, MidLevel) | (Senior, Lead) | (Lead, Senior) => 0.6,
        _ => 0.3,
    }
}

/// Human readable reason naming the features that matched
pub fn build_reason(features: &FeatureMatches) -> String {
    let mut parts = Vec::new();

    if let Some(city) = &features.city {
        parts.push(format!("city ({})", city));
    }
    if !features.career_paths.is_empty() {
        parts.push(format!("career path ({})", features.career_paths.join(", ")));
    }
    if features.visa {
        parts.push("visa sponsorship".to_string());
    }
    if features.language {
        parts.push("language".to_string());
    }
    if features.level {
        parts.push("experience level".to_string());
    }
    if features.fresh {
        parts.push("freshness".to_string());
    }

    if parts.is_empty() {
        "Eligible posting with no strong preference signals".to_string()
    } else {
        format!("Matched on {}", parts.join(", "))
    }
}

/// Deterministic, dependency-free tier. Always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer {
    weights: ScoringWeights,
}

impl RuleBasedScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score every job; never empty for non-empty input
    pub fn score_all(&self, user: &UserProfile, jobs: &[JobPosting]) -> Vec<ScoredJob> {
        jobs.iter()
            .map(|job| {
                let (score, features) = calculate_rule_score(user, job, &self.weights);
                ScoredJob::new(job.job_hash.clone(), score, build_reason(&features))
            })
            .collect()
    }
}

#[async_trait]
impl Scorer for RuleBasedScorer {
    fn tier(&self) -> Tier {
        Tier::RuleBased
    }

    async fn score(
        &self,
        user: &UserProfile,
        jobs: &[JobPosting],
    ) -> Result<Vec<ScoredJob>, ScoreFailure> {
        Ok(self.score_all(user, jobs))
    }
}
