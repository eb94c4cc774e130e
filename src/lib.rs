//! JobMatch - resilient matching engine for the weekly jobs newsletter
//!
//! Turns a subscriber profile and a pool of job postings into a bounded,
//! ranked list of eligible matches. Scoring tiers (AI, semantic, rule-based)
//! are tried in order behind circuit breakers, so the engine keeps answering
//! when the AI provider is slow or down.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{filter_eligible, MatchEngine, MatchOutcome, Scorer};
pub use models::{
    CandidatePool, FindMatchesRequest, FindMatchesResponse, JobPosting, MatchMethod, MatchResult,
    ScoringWeights, UserProfile,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let engine = MatchEngine::default();
        assert_eq!(engine.count_policy().free, 5);
        assert_eq!(MatchMethod::Cached.to_string(), "cached");
    }
}
