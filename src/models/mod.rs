// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CandidatePool, ExperienceLevel, FreshnessTier, JobPosting, MatchMethod, MatchResult,
    ScoringWeights, SubscriptionTier, Tier, UserProfile, WorkEnvironment,
};
pub use requests::{FindMatchesRequest, SentJobsQuery};
pub use responses::{ErrorResponse, FindMatchesResponse, HealthResponse, SentJobsResponse};
