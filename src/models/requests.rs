use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{JobPosting, UserProfile};

/// Request to find matches for one subscriber against a candidate pool
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FindMatchesRequest {
    #[validate(custom(function = "validate_user"))]
    pub user: UserProfile,
    #[serde(default)]
    pub jobs: Vec<JobPosting>,
    #[validate(length(min = 1))]
    #[serde(alias = "pool_version", rename = "poolVersion")]
    pub pool_version: String,
    #[validate(range(min = 1, max = 60000))]
    #[serde(alias = "deadline_ms", rename = "deadlineMs")]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    #[serde(alias = "exclude_job_hashes", rename = "excludeJobHashes")]
    pub exclude_job_hashes: Vec<String>,
    /// Persist the returned matches as delivered
    #[serde(default)]
    #[serde(alias = "record_delivery", rename = "recordDelivery")]
    pub record_delivery: bool,
}

fn validate_user(user: &UserProfile) -> Result<(), validator::ValidationError> {
    if user.email.trim().is_empty() || !user.email.contains('@') {
        return Err(validator::ValidationError::new("invalid_email"));
    }
    Ok(())
}

/// Query for previously delivered jobs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SentJobsQuery {
    #[validate(email)]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_with_defaults() {
        let body = r#"{
            "user": {"email": "sam@example.com", "target_cities": ["London"]},
            "poolVersion": "2024-w10"
        }"#;

        let req: FindMatchesRequest = serde_json::from_str(body).unwrap();
        assert!(req.jobs.is_empty());
        assert!(req.deadline_ms.is_none());
        assert!(!req.record_delivery);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_bad_email() {
        let body = r#"{"user": {"email": "nope"}, "poolVersion": "v1"}"#;
        let req: FindMatchesRequest = serde_json::from_str(body).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_rejects_empty_pool_version() {
        let body = r#"{"user": {"email": "sam@example.com"}, "poolVersion": ""}"#;
        let req: FindMatchesRequest = serde_json::from_str(body).unwrap();
        assert!(req.validate().is_err());
    }
}
