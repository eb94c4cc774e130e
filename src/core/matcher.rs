use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::{
    budget::CostBudget,
    circuit::{CircuitBreaker, CircuitBreakers, CircuitState},
    filters::filter_eligible,
    scorer::{ScoreFailure, Scorer},
    scoring::RuleBasedScorer,
    validator::{CountPolicy, QualityValidator, ValidatedScore},
};
use crate::models::{CandidatePool, JobPosting, MatchMethod, MatchResult, ScoringWeights, Tier, UserProfile};
use crate::services::cache::{fingerprint, CacheStats, ResultCache};

/// Result of the matching process
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub results: Vec<MatchResult>,
    pub method: MatchMethod,
    pub eligible_count: usize,
    pub total_candidates: usize,
}

struct TierSlot {
    scorer: Arc<dyn Scorer>,
    timeout: Duration,
    circuit: Option<Arc<CircuitBreaker>>,
}

/// Main matching orchestrator
///
/// # Pipeline Stages
/// 1. Eligibility filtering
/// 2. Result cache lookup
/// 3. Scoring tiers in configured order, each behind its circuit breaker
/// 4. Validation, rule-based back-fill and ranking
/// 5. Cache write-through
///
/// The rule-based scorer is always the terminal tier, whether or not it was
/// configured. `find_matches` never fails; degradation is disclosed through
/// `method` and `confidence`.
pub struct MatchEngine {
    tiers: Vec<TierSlot>,
    circuits: CircuitBreakers,
    budget: Arc<CostBudget>,
    validator: QualityValidator,
    cache: Option<Arc<ResultCache>>,
    fallback: RuleBasedScorer,
}

/// Builder for [`MatchEngine`]
pub struct MatchEngineBuilder {
    scorers: Vec<(Arc<dyn Scorer>, Duration)>,
    circuits: CircuitBreakers,
    budget: Arc<CostBudget>,
    policy: CountPolicy,
    cache: Option<Arc<ResultCache>>,
    weights: ScoringWeights,
}

impl MatchEngineBuilder {
    /// Append a tier; tiers are tried in the order they are added
    pub fn tier(mut self, scorer: Arc<dyn Scorer>, timeout: Duration) -> Self {
        self.scorers.push((scorer, timeout));
        self
    }

    pub fn circuits(mut self, circuits: CircuitBreakers) -> Self {
        self.circuits = circuits;
        self
    }

    pub fn budget(mut self, budget: Arc<CostBudget>) -> Self {
        self.budget = budget;
        self
    }

    pub fn count_policy(mut self, policy: CountPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn build(self) -> MatchEngine {
        let circuits = self.circuits;
        let tiers = self
            .scorers
            .into_iter()
            .map(|(scorer, timeout)| TierSlot {
                circuit: circuits.get(scorer.tier()),
                scorer,
                timeout,
            })
            .collect();

        MatchEngine {
            tiers,
            circuits,
            budget: self.budget,
            validator: QualityValidator::new(self.policy),
            cache: self.cache,
            fallback: RuleBasedScorer::new(self.weights),
        }
    }
}

impl MatchEngine {
    pub fn builder() -> MatchEngineBuilder {
        MatchEngineBuilder {
            scorers: Vec::new(),
            circuits: CircuitBreakers::default(),
            budget: Arc::new(CostBudget::default()),
            policy: CountPolicy::default(),
            cache: None,
            weights: ScoringWeights::default(),
        }
    }

    /// Configured tier order, terminal rule-based tier included
    pub fn tier_order(&self) -> Vec<Tier> {
        let mut order: Vec<Tier> = self.tiers.iter().map(|slot| slot.scorer.tier()).collect();
        if !order.contains(&Tier::RuleBased) {
            order.push(Tier::RuleBased);
        }
        order
    }

    pub fn circuits(&self) -> &CircuitBreakers {
        &self.circuits
    }

    pub fn circuit_states(&self) -> Vec<CircuitState> {
        self.circuits.snapshot()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    pub fn count_policy(&self) -> CountPolicy {
        self.validator.policy()
    }

    /// Find matches for a user in a candidate pool
    ///
    /// `deadline` is the caller's overall budget for this request. A tier
    /// still running when it expires is abandoned and the engine moves on
    /// to the next tier; the rule-based tier always runs.
    pub async fn find_matches(
        &self,
        user: &UserProfile,
        pool: &CandidatePool,
        deadline: Option<Duration>,
    ) -> MatchOutcome {
        let deadline_at = deadline.map(|d| Instant::now() + d);
        let total_candidates = pool.jobs.len();

        let (eligible, report) = filter_eligible(user, &pool.jobs);
        debug!(
            user = %user.email,
            total = total_candidates,
            eligible = eligible.len(),
            inactive = report.inactive,
            location = report.location,
            visa = report.visa,
            language = report.language,
            seniority = report.seniority,
            "Eligibility filter applied"
        );

        if eligible.is_empty() {
            info!(user = %user.email, total = total_candidates, "No eligible jobs, returning empty match set");
            return MatchOutcome {
                results: Vec::new(),
                method: MatchMethod::None,
                eligible_count: 0,
                total_candidates,
            };
        }

        let key = fingerprint(user, &pool.version);
        if let Some(results) = self.read_cache(&key, user, &eligible).await {
            return MatchOutcome {
                results,
                method: MatchMethod::Cached,
                eligible_count: eligible.len(),
                total_candidates,
            };
        }

        for slot in &self.tiers {
            let tier = slot.scorer.tier();

            if let Some(circuit) = &slot.circuit {
                if !circuit.allow_request() {
                    info!(user = %user.email, tier = %tier, "Circuit open, skipping tier");
                    continue;
                }
            }

            let remaining = deadline_at.map(|at| at.saturating_duration_since(Instant::now()));
            let (limit, caller_bound) = match remaining {
                Some(left) if left < slot.timeout => (left, true),
                _ => (slot.timeout, false),
            };
            if caller_bound && limit.is_zero() && tier != Tier::RuleBased {
                info!(user = %user.email, tier = %tier, "Request deadline exhausted, skipping tier");
                continue;
            }

            let planned = slot.scorer.planned_calls(eligible.len());
            if planned > 0 {
                if let Err(err) = self.budget.try_reserve(&user.email, planned) {
                    let failure = ScoreFailure::BudgetExceeded(err.to_string());
                    warn!(
                        user = %user.email,
                        tier = %tier,
                        reason = failure.kind(),
                        error = %failure,
                        "Falling back to next tier"
                    );
                    continue;
                }
            }

            let raw = match tokio::time::timeout(limit, slot.scorer.score(user, &eligible)).await {
                Ok(Ok(raw)) => raw,
                Ok(Err(failure)) => {
                    self.record_failure(slot, user, &failure);
                    continue;
                }
                Err(_) if caller_bound => {
                    info!(
                        user = %user.email,
                        tier = %tier,
                        waited_ms = limit.as_millis() as u64,
                        "Abandoned tier at request deadline, falling back"
                    );
                    continue;
                }
                Err(_) => {
                    self.record_failure(slot, user, &ScoreFailure::Timeout);
                    continue;
                }
            };

            let (scores, report) = self.validator.check(tier, raw, &eligible);
            if report.clamped + report.rejected_malformed + report.rejected_ineligible + report.duplicates > 0 {
                warn!(
                    user = %user.email,
                    tier = %tier,
                    clamped = report.clamped,
                    malformed = report.rejected_malformed,
                    ineligible = report.rejected_ineligible,
                    duplicates = report.duplicates,
                    "Tier output corrected by validator"
                );
            }

            if scores.is_empty() {
                let failure = ScoreFailure::Malformed("no usable scores".to_string());
                self.record_failure(slot, user, &failure);
                continue;
            }

            if let Some(circuit) = &slot.circuit {
                circuit.record_success();
            }

            return self
                .complete(user, &key, tier.method(), scores, &eligible, total_candidates)
                .await;
        }

        info!(user = %user.email, "Using terminal rule-based tier");
        let (scores, _) = self
            .validator
            .check(Tier::RuleBased, self.fallback.score_all(user, &eligible), &eligible);
        self.complete(user, &key, MatchMethod::RuleBased, scores, &eligible, total_candidates)
            .await
    }

    /// Reset circuits, the cost ledger and the in-process cache
    pub fn reset(&self) {
        self.circuits.reset();
        self.budget.reset();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    pub fn shutdown(&self) {
        info!(spent_usd = self.budget.spent_today(), "Match engine shutting down");
        self.circuits.shutdown();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    fn record_failure(&self, slot: &TierSlot, user: &UserProfile, failure: &ScoreFailure) {
        warn!(
            user = %user.email,
            tier = %slot.scorer.tier(),
            reason = failure.kind(),
            error = %failure,
            "Tier failed, falling back"
        );
        if let Some(circuit) = &slot.circuit {
            circuit.record_failure();
        }
    }

    /// A hit is only served if it still fits the current eligible set;
    /// anything else is treated as a miss and rescored.
    async fn read_cache(
        &self,
        key: &str,
        user: &UserProfile,
        eligible: &[JobPosting],
    ) -> Option<Vec<MatchResult>> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(entry)) => {
                let hashes: HashSet<&str> = eligible.iter().map(|job| job.job_hash.as_str()).collect();
                let wanted = self.validator.policy().target(user.subscription_tier).min(eligible.len());
                let fits = entry.results.len() == wanted
                    && entry.results.iter().all(|r| hashes.contains(r.job_hash.as_str()));
                if !fits {
                    warn!(
                        user = %user.email,
                        cached = entry.results.len(),
                        eligible = eligible.len(),
                        "Cached matches no longer eligible, rescoring"
                    );
                    return None;
                }

                info!(user = %user.email, original_method = %entry.method, "Serving cached matches");
                Some(
                    entry
                        .results
                        .into_iter()
                        .map(|mut result| {
                            result.method = MatchMethod::Cached;
                            result
                        })
                        .collect(),
                )
            }
            Ok(None) => None,
            Err(err) => {
                warn!(user = %user.email, error = %err, "Cache unavailable, continuing without cache");
                None
            }
        }
    }

    /// Back-fill, rank, convert and write through to the cache
    async fn complete(
        &self,
        user: &UserProfile,
        key: &str,
        method: MatchMethod,
        mut scores: Vec<ValidatedScore>,
        eligible: &[JobPosting],
        total_candidates: usize,
    ) -> MatchOutcome {
        let target = self.validator.policy().target(user.subscription_tier);
        let wanted = target.min(eligible.len());

        if scores.len() < wanted {
            let scored: HashSet<&str> = scores.iter().map(|s| s.job_hash.as_str()).collect();
            let rest: Vec<JobPosting> = eligible
                .iter()
                .filter(|job| !scored.contains(job.job_hash.as_str()))
                .cloned()
                .collect();
            let (extra, _) = self
                .validator
                .check(Tier::RuleBased, self.fallback.score_all(user, &rest), eligible);
            info!(
                user = %user.email,
                method = %method,
                scored = scores.len(),
                backfilled = extra.len(),
                "Back-filling with rule-based scores"
            );
            scores.extend(extra);
        }

        let matched_at = Utc::now();
        let results: Vec<MatchResult> = self
            .validator
            .finalize(scores, user.subscription_tier)
            .into_iter()
            .map(|score| score.into_result(&user.email, matched_at))
            .collect();

        info!(
            user = %user.email,
            method = %method,
            count = results.len(),
            eligible = eligible.len(),
            "Matches produced"
        );

        if let Some(cache) = &self.cache {
            if !results.is_empty() {
                if let Err(err) = cache.put(key, results.clone(), method).await {
                    warn!(user = %user.email, error = %err, "Cache unavailable, result not cached");
                }
            }
        }

        MatchOutcome {
            results,
            method,
            eligible_count: eligible.len(),
            total_candidates,
        }
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}
