use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::core::scorer::ScoredJob;
use crate::models::{JobPosting, MatchResult, SubscriptionTier, Tier};

/// Per-tier result counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountPolicy {
    /// Exact count for free subscribers (N_free)
    pub free: usize,
    /// Upper bound for premium subscribers (N_premium)
    pub premium: usize,
}

impl Default for CountPolicy {
    fn default() -> Self {
        Self { free: 5, premium: 10 }
    }
}

impl CountPolicy {
    pub fn target(&self, tier: SubscriptionTier) -> usize {
        match tier {
            SubscriptionTier::Free => self.free,
            SubscriptionTier::Premium => self.premium,
        }
    }
}

/// What the validator changed, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub clamped: usize,
    pub rejected_malformed: usize,
    pub rejected_ineligible: usize,
    pub duplicates: usize,
}

/// A validated score still tied to its posting
#[derive(Debug, Clone)]
pub struct ValidatedScore {
    pub job_hash: String,
    pub score: f64,
    pub reason: String,
    pub tier: Tier,
    pub posted_at: DateTime<Utc>,
}

impl ValidatedScore {
    pub fn into_result(self, user_email: &str, matched_at: DateTime<Utc>) -> MatchResult {
        MatchResult {
            job_hash: self.job_hash,
            user_email: user_email.to_string(),
            match_score: self.score,
            match_reason: self.reason,
            method: self.tier.method(),
            confidence: confidence_for(self.tier, self.score),
            matched_at,
        }
    }
}

/// Confidence discloses how a score was produced; weak scores from any tier
/// are less certain than strong ones
fn confidence_for(tier: Tier, score: f64) -> f64 {
    let base = tier.base_confidence();
    let strength = 0.8 + 0.2 * (score / 100.0);
    (base * strength).clamp(0.0, 1.0)
}

/// Guards every tier's output before it reaches the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityValidator {
    policy: CountPolicy,
}

impl QualityValidator {
    pub fn new(policy: CountPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CountPolicy {
        self.policy
    }

    /// Check raw tier output against the eligible set
    ///
    /// AI output is strict: out-of-range scores and missing reasons are
    /// discarded per job. Local tiers are clamped into [0, 100]. Entries
    /// for jobs outside `eligible` are always dropped.
    pub fn check(
        &self,
        tier: Tier,
        raw: Vec<ScoredJob>,
        eligible: &[JobPosting],
    ) -> (Vec<ValidatedScore>, ValidationReport) {
        let posted: HashMap<&str, DateTime<Utc>> = eligible
            .iter()
            .map(|job| (job.job_hash.as_str(), job.posted_at))
            .collect();

        let mut report = ValidationReport::default();
        let mut best: HashMap<String, ValidatedScore> = HashMap::new();

        for entry in raw {
            let Some(posted_at) = posted.get(entry.job_hash.as_str()).copied() else {
                report.rejected_ineligible += 1;
                warn!(tier = %tier, job_hash = %entry.job_hash, "Dropped score for job outside eligible set");
                continue;
            };

            let reason = entry
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);

            let in_range = entry.score.is_finite() && (0.0..=100.0).contains(&entry.score);

            let (score, reason) = match (tier, in_range, reason) {
                (Tier::Ai, false, _) | (Tier::Ai, _, None) => {
                    report.rejected_malformed += 1;
                    debug!(job_hash = %entry.job_hash, score = entry.score, "Discarded malformed AI score");
                    continue;
                }
                (_, true, Some(reason)) => (entry.score, reason),
                (_, in_range, reason) => {
                    let score = if entry.score.is_finite() {
                        entry.score.clamp(0.0, 100.0)
                    } else {
                        0.0
                    };
                    if !in_range {
                        report.clamped += 1;
                        warn!(tier = %tier, job_hash = %entry.job_hash, raw = entry.score, clamped = score, "Score clamped");
                    }
                    (score, reason.unwrap_or_else(|| format!("Scored by {}", tier)))
                }
            };

            let candidate = ValidatedScore {
                job_hash: entry.job_hash.clone(),
                score,
                reason,
                tier,
                posted_at,
            };

            let improves = best
                .get(&entry.job_hash)
                .map(|existing| candidate.score > existing.score);
            match improves {
                Some(false) => report.duplicates += 1,
                Some(true) => {
                    report.duplicates += 1;
                    best.insert(entry.job_hash, candidate);
                }
                None => {
                    best.insert(entry.job_hash, candidate);
                }
            }
        }

        (best.into_values().collect(), report)
    }

    /// Rank and truncate to the subscription's count
    ///
    /// Sorted by score descending, ties broken by most recent posting, then
    /// job hash so the order is fully deterministic. Never pads.
    pub fn finalize(
        &self,
        mut scores: Vec<ValidatedScore>,
        subscription: SubscriptionTier,
    ) -> Vec<ValidatedScore> {
        scores.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.posted_at.cmp(&a.posted_at))
                .then_with(|| a.job_hash.cmp(&b.job_hash))
        });

        scores.truncate(self.policy.target(subscription));
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceLevel, FreshnessTier, WorkEnvironment};
    use chrono::Duration;

    fn create_test_job(hash: &str, age_hours: i64) -> JobPosting {
        JobPosting {
            job_hash: hash.to_string(),
            title: "Analyst".to_string(),
            company: "Acme".to_string(),
            city: "London".to_string(),
            country: "UK".to_string(),
            description: String::new(),
            categories: vec![],
            experience_level: ExperienceLevel::Graduate,
            work_environment: WorkEnvironment::OnSite,
            visa_friendly: true,
            language_requirements: vec![],
            posted_at: Utc::now() - Duration::hours(age_hours),
            freshness_tier: FreshnessTier::Fresh,
            active: true,
        }
    }

    #[test]
    fn test_local_tier_scores_are_clamped() {
        let validator = QualityValidator::default();
        let eligible = vec![create_test_job("a", 1), create_test_job("b", 1)];
        let raw = vec![ScoredJob::new("a", 140.0, "great"), ScoredJob::new("b", -3.0, "poor")];

        let (scores, report) = validator.check(Tier::RuleBased, raw, &eligible);

        assert_eq!(scores.len(), 2);
        assert_eq!(report.clamped, 2);
        assert!(scores.iter().all(|s| (0.0..=100.0).contains(&s.score)));
    }

    #[test]
    fn test_ai_malformed_entries_discarded_individually() {
        let validator = QualityValidator::default();
        let eligible = vec![create_test_job("a", 1), create_test_job("b", 1), create_test_job("c", 1)];
        let raw = vec![
            ScoredJob::new("a", 88.0, "strong fit"),
            ScoredJob::new("b", 120.0, "too good"),
            ScoredJob { job_hash: "c".to_string(), score: 50.0, reason: Some("  ".to_string()) },
        ];

        let (scores, report) = validator.check(Tier::Ai, raw, &eligible);

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].job_hash, "a");
        assert_eq!(report.rejected_malformed, 2);
    }

    #[test]
    fn test_ineligible_jobs_dropped() {
        let validator = QualityValidator::default();
        let eligible = vec![create_test_job("a", 1)];
        let raw = vec![ScoredJob::new("a", 60.0, "ok"), ScoredJob::new("ghost", 99.0, "not real")];

        let (scores, report) = validator.check(Tier::Semantic, raw, &eligible);

        assert_eq!(scores.len(), 1);
        assert_eq!(report.rejected_ineligible, 1);
    }

    #[test]
    fn test_duplicates_keep_best_score() {
        let validator = QualityValidator::default();
        let eligible = vec![create_test_job("a", 1)];
        let raw = vec![ScoredJob::new("a", 40.0, "first"), ScoredJob::new("a", 70.0, "second")];

        let (scores, report) = validator.check(Tier::Semantic, raw, &eligible);

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 70.0);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_finalize_orders_ties_by_recency() {
        let validator = QualityValidator::default();
        let eligible = vec![create_test_job("old", 48), create_test_job("new", 1), create_test_job("top", 100)];
        let raw = vec![
            ScoredJob::new("old", 50.0, "x"),
            ScoredJob::new("new", 50.0, "x"),
            ScoredJob::new("top", 90.0, "x"),
        ];

        let (scores, _) = validator.check(Tier::RuleBased, raw, &eligible);
        let ranked = validator.finalize(scores, SubscriptionTier::Premium);

        let order: Vec<&str> = ranked.iter().map(|s| s.job_hash.as_str()).collect();
        assert_eq!(order, vec!["top", "new", "old"]);
    }

    #[test]
    fn test_finalize_truncates_per_subscription() {
        let validator = QualityValidator::new(CountPolicy { free: 2, premium: 3 });
        let eligible: Vec<JobPosting> = (0..6).map(|i| create_test_job(&i.to_string(), i)).collect();
        let raw: Vec<ScoredJob> = eligible
            .iter()
            .map(|j| ScoredJob::new(j.job_hash.clone(), 50.0, "x"))
            .collect();

        let (scores, _) = validator.check(Tier::RuleBased, raw.clone(), &eligible);
        assert_eq!(validator.finalize(scores, SubscriptionTier::Free).len(), 2);

        let (scores, _) = validator.check(Tier::RuleBased, raw, &eligible);
        assert_eq!(validator.finalize(scores, SubscriptionTier::Premium).len(), 3);
    }

    #[test]
    fn test_finalize_never_pads() {
        let validator = QualityValidator::default();
        let eligible = vec![create_test_job("a", 1)];
        let (scores, _) = validator.check(Tier::RuleBased, vec![ScoredJob::new("a", 10.0, "x")], &eligible);

        assert_eq!(validator.finalize(scores, SubscriptionTier::Free).len(), 1);
    }

    #[test]
    fn test_confidence_reflects_tier() {
        assert!(confidence_for(Tier::Ai, 80.0) > confidence_for(Tier::RuleBased, 80.0));
        assert!(confidence_for(Tier::Ai, 100.0) <= 1.0);
    }
}
