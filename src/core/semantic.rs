//! Keyword similarity tier.
//!
//! Compares the user's career paths, skills and industries against a
//! posting's categories, title and description using weighted term
//! overlap. Purely local: it cannot time out or hit a provider.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::core::scorer::{ScoreFailure, ScoredJob, Scorer};
use crate::models::{JobPosting, Tier, UserProfile};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of",
    "on", "or", "our", "the", "to", "we", "with", "you", "your", "will", "this", "that",
];

const MIN_TERM_LEN: usize = 2;

/// Relative weight of each user attribute group
#[derive(Debug, Clone, Copy)]
pub struct SemanticWeights {
    pub career_path: f64,
    pub skills: f64,
    pub industries: f64,
}

impl Default for SemanticWeights {
    fn default() -> Self {
        Self {
            career_path: 0.40,
            skills: 0.40,
            industries: 0.20,
        }
    }
}

/// Lower-cased, stop-word free terms of a text
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .map(str::to_lowercase)
        .filter(|t| t.len() >= MIN_TERM_LEN && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn tokenize_all(items: &[String]) -> HashSet<String> {
    items.iter().flat_map(|item| tokenize(item)).collect()
}

/// Share of `wanted` terms present in `offered` (0-1)
#[inline]
fn coverage(wanted: &HashSet<String>, offered: &HashSet<String>) -> Option<f64> {
    if wanted.is_empty() {
        return None;
    }
    let hits = wanted.intersection(offered).count();
    Some(hits as f64 / wanted.len() as f64)
}

/// Similarity of one posting to the user, with the overlapping terms
pub fn semantic_similarity(
    user: &UserProfile,
    job: &JobPosting,
    weights: &SemanticWeights,
) -> (f64, Vec<String>) {
    let categories = tokenize_all(&job.categories);
    let mut job_terms = tokenize(&job.title);
    job_terms.extend(tokenize(&job.description));
    job_terms.extend(categories.iter().cloned());

    let career = tokenize_all(&user.career_path);
    let skills = tokenize_all(&user.skills);
    let industries = tokenize_all(&user.industries);

    // Career paths count double when they hit a category rather than prose
    let career_cov = coverage(&career, &categories)
        .zip(coverage(&career, &job_terms))
        .map(|(cat, any)| (cat + any) / 2.0);

    let groups = [
        (career_cov, weights.career_path),
        (coverage(&skills, &job_terms), weights.skills),
        (coverage(&industries, &job_terms), weights.industries),
    ];

    // Groups the user left empty drop out of the denominator
    let (weighted, weight_sum) = groups
        .iter()
        .filter_map(|(cov, w)| cov.map(|c| (c * w, *w)))
        .fold((0.0, 0.0), |(acc, ws), (c, w)| (acc + c, ws + w));

    let score = if weight_sum > 0.0 {
        weighted / weight_sum * 100.0
    } else {
        0.0
    };

    let mut shared: Vec<String> = career
        .union(&skills)
        .chain(industries.iter())
        .filter(|t| job_terms.contains(*t))
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    shared.sort();

    (score.clamp(0.0, 100.0), shared)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticScorer {
    weights: SemanticWeights,
}

#[async_trait]
impl Scorer for SemanticScorer {
    fn tier(&self) -> Tier {
        Tier::Semantic
    }

    async fn score(
        &self,
        user: &UserProfile,
        jobs: &[JobPosting],
    ) -> Result<Vec<ScoredJob>, ScoreFailure> {
        let scored = jobs
            .iter()
            .map(|job| {
                let (score, shared) = semantic_similarity(user, job, &self.weights);
                let reason = if shared.is_empty() {
                    "No overlapping keywords with your profile".to_string()
                } else {
                    format!("Shares keywords with your profile: {}", shared.join(", "))
                };
                ScoredJob::new(job.job_hash.clone(), score, reason)
            })
            .collect();

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceLevel, FreshnessTier, SubscriptionTier, WorkEnvironment};
    use chrono::Utc;

    fn create_test_job(title: &str, description: &str, categories: &[&str]) -> JobPosting {
        JobPosting {
            job_hash: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            company: "Acme".to_string(),
            city: "London".to_string(),
            country: "UK".to_string(),
            description: description.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            experience_level: ExperienceLevel::Graduate,
            work_environment: WorkEnvironment::Remote,
            visa_friendly: true,
            language_requirements: vec![],
            posted_at: Utc::now(),
            freshness_tier: FreshnessTier::Fresh,
            active: true,
        }
    }

    fn create_test_user() -> UserProfile {
        UserProfile {
            email: "dev@example.com".to_string(),
            target_cities: vec!["London".to_string()],
            languages_spoken: vec![],
            visa_status: String::new(),
            career_path: vec!["Tech".to_string()],
            experience_level: ExperienceLevel::Graduate,
            subscription_tier: SubscriptionTier::Free,
            skills: vec!["Rust".to_string(), "SQL".to_string()],
            industries: vec!["fintech".to_string()],
        }
    }

    #[test]
    fn test_tokenize_drops_stop_words() {
        let terms = tokenize("The Rust and C++ team, for you");
        assert!(terms.contains("rust"));
        assert!(terms.contains("c++"));
        assert!(terms.contains("team"));
        assert!(!terms.contains("the"));
        assert!(!terms.contains("for"));
    }

    #[test]
    fn test_relevant_job_scores_higher() {
        let user = create_test_user();
        let weights = SemanticWeights::default();

        let relevant = create_test_job("Graduate Rust Engineer", "SQL and Rust at a fintech", &["tech"]);
        let unrelated = create_test_job("Barista", "Coffee and customer service", &["hospitality"]);

        let (high, shared) = semantic_similarity(&user, &relevant, &weights);
        let (low, _) = semantic_similarity(&user, &unrelated, &weights);

        assert!(high > low);
        assert!(shared.contains(&"rust".to_string()));
        assert_eq!(low, 0.0);
    }

    #[test]
    fn test_empty_profile_scores_zero() {
        let mut user = create_test_user();
        user.career_path.clear();
        user.skills.clear();
        user.industries.clear();

        let job = create_test_job("Analyst", "Numbers", &["finance"]);
        let (score, shared) = semantic_similarity(&user, &job, &SemanticWeights::default());

        assert_eq!(score, 0.0);
        assert!(shared.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_returns_no_matches() {
        let scorer = SemanticScorer::default();
        let result = scorer.score(&create_test_user(), &[]).await;
        assert_eq!(result, Ok(vec![]));
    }
}
