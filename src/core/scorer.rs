use async_trait::async_trait;
use thiserror::Error;

use crate::models::{JobPosting, Tier, UserProfile};

/// Why a tier produced no usable output
///
/// None of these reach the caller; the orchestrator turns every one of them
/// into "try the next tier".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreFailure {
    #[error("timed out")]
    Timeout,

    #[error("rate limited by provider")]
    RateLimited,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ScoreFailure {
    /// Short label used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Malformed(_) => "malformed",
            Self::BudgetExceeded(_) => "budget-exceeded",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

/// One raw per-job score emitted by a tier, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredJob {
    pub job_hash: String,
    pub score: f64,
    pub reason: Option<String>,
}

impl ScoredJob {
    pub fn new(job_hash: impl Into<String>, score: f64, reason: impl Into<String>) -> Self {
        Self {
            job_hash: job_hash.into(),
            score,
            reason: Some(reason.into()),
        }
    }
}

/// A scoring strategy the orchestrator can try
#[async_trait]
pub trait Scorer: Send + Sync {
    fn tier(&self) -> Tier;

    /// Number of paid provider calls scoring `job_count` jobs would need.
    /// Local tiers cost nothing.
    fn planned_calls(&self, _job_count: usize) -> u32 {
        0
    }

    async fn score(
        &self,
        user: &UserProfile,
        jobs: &[JobPosting],
    ) -> Result<Vec<ScoredJob>, ScoreFailure>;
}
