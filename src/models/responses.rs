use serde::{Deserialize, Serialize};

use crate::core::circuit::CircuitState;
use crate::services::cache::CacheStats;
use crate::models::domain::{MatchMethod, MatchResult};

/// Response for find matches endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindMatchesResponse {
    pub matches: Vec<MatchResult>,
    pub method: MatchMethod,
    pub eligible_count: usize,
    pub total_candidates: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub circuits: Vec<CircuitState>,
    pub cache: Option<CacheStats>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Previously delivered jobs for a subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentJobsResponse {
    pub email: String,
    pub job_hashes: Vec<String>,
    pub count: usize,
}
