use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::core::scorer::{ScoreFailure, ScoredJob, Scorer};
use crate::models::{JobPosting, Tier, UserProfile};

const DESCRIPTION_SNIPPET_CHARS: usize = 400;

/// Job as presented to the language model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub job_hash: String,
    pub summary: String,
}

/// Request body sent to the scoring provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBatchRequest {
    pub model: String,
    pub user_summary: String,
    pub jobs: Vec<JobSummary>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderScore {
    pub job_hash: String,
    pub score: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    Timeout,
    RateLimited,
    Malformed,
    #[serde(other)]
    Other,
}

/// Every shape the provider may answer with
///
/// Anything that does not decode into one of these variants is treated as a
/// malformed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderResponse {
    ScoreBatch {
        scores: Vec<ProviderScore>,
    },
    Error {
        code: ProviderErrorCode,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ProviderResponse {
    /// Per-job scores, or the failure the provider reported
    pub fn into_scores(self) -> Result<Vec<ProviderScore>, ScoreFailure> {
        match self {
            Self::ScoreBatch { scores } => Ok(scores),
            Self::Error { code, message } => {
                let message = message.unwrap_or_else(|| "no message".to_string());
                Err(match code {
                    ProviderErrorCode::Timeout => ScoreFailure::Timeout,
                    ProviderErrorCode::RateLimited => ScoreFailure::RateLimited,
                    ProviderErrorCode::Malformed => ScoreFailure::Malformed(message),
                    ProviderErrorCode::Other => ScoreFailure::Unavailable(message),
                })
            }
        }
    }
}

/// Boundary to the external language-model provider
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn score_batch(&self, request: &ScoreBatchRequest) -> Result<ProviderResponse, ScoreFailure>;
}

/// JSON-over-HTTP language model provider
pub struct HttpLanguageModel {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl HttpLanguageModel {
    /// Create a new provider client
    ///
    /// `request_timeout` is a backstop; the orchestrator applies its own,
    /// usually shorter, deadline around every call.
    pub fn new(endpoint: String, api_key: String, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn score_batch(&self, request: &ScoreBatchRequest) -> Result<ProviderResponse, ScoreFailure> {
        tracing::debug!(jobs = request.jobs.len(), "Sending score batch to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(ScoreFailure::RateLimited),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => return Err(ScoreFailure::Timeout),
            s if !s.is_success() => {
                return Err(ScoreFailure::Unavailable(format!("provider returned {}", s)))
            }
            _ => {}
        }

        let body = response.bytes().await.map_err(map_transport_error)?;
        serde_json::from_slice::<ProviderResponse>(&body)
            .map_err(|e| ScoreFailure::Malformed(format!("undecodable provider payload: {}", e)))
    }
}

fn map_transport_error(err: reqwest::Error) -> ScoreFailure {
    if err.is_timeout() {
        ScoreFailure::Timeout
    } else if err.is_decode() {
        ScoreFailure::Malformed(err.to_string())
    } else {
        ScoreFailure::Unavailable(err.to_string())
    }
}

/// Highest quality tier: asks the language model to score postings
pub struct AiScorer {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    batch_size: usize,
    max_tokens: u32,
}

impl AiScorer {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: impl Into<String>, batch_size: usize, max_tokens: u32) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            batch_size: batch_size.max(1),
            max_tokens,
        }
    }

    fn build_request(&self, user: &UserProfile, jobs: &[JobPosting]) -> ScoreBatchRequest {
        ScoreBatchRequest {
            model: self.model_name.clone(),
            user_summary: summarize_user(user),
            jobs: jobs
                .iter()
                .map(|job| JobSummary {
                    job_hash: job.job_hash.clone(),
                    summary: summarize_job(job),
                })
                .collect(),
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Scorer for AiScorer {
    fn tier(&self) -> Tier {
        Tier::Ai
    }

    fn planned_calls(&self, job_count: usize) -> u32 {
        job_count.div_ceil(self.batch_size) as u32
    }

    async fn score(
        &self,
        user: &UserProfile,
        jobs: &[JobPosting],
    ) -> Result<Vec<ScoredJob>, ScoreFailure> {
        let mut scored = Vec::with_capacity(jobs.len());

        for batch in jobs.chunks(self.batch_size) {
            let request = self.build_request(user, batch);
            let scores = self.model.score_batch(&request).await?.into_scores()?;

            scored.extend(scores.into_iter().map(|s| ScoredJob {
                job_hash: s.job_hash,
                score: s.score,
                reason: s.reason,
            }));
        }

        Ok(scored)
    }
}

/// One-paragraph description of what the user is looking for
pub fn summarize_user(user: &UserProfile) -> String {
    format!(
        "Level: {:?}. Career paths: {}. Skills: {}. Industries: {}. Cities: {}. Languages: {}. Visa: {}.",
        user.experience_level,
        join_or_none(&user.career_path),
        join_or_none(&user.skills),
        join_or_none(&user.industries),
        join_or_none(&user.target_cities),
        join_or_none(&user.languages_spoken),
        if user.visa_status.is_empty() { "unspecified" } else { user.visa_status.as_str() },
    )
}

pub fn summarize_job(job: &JobPosting) -> String {
    let snippet: String = job.description.chars().take(DESCRIPTION_SNIPPET_CHARS).collect();
    format!(
        "{} at {} ({}, {}). Level: {:?}. Categories: {}. {}",
        job.title,
        job.company,
        job.city,
        job.country,
        job.experience_level,
        join_or_none(&job.categories),
        snippet,
    )
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
