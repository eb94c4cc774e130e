use actix_web::{web, HttpResponse, Responder};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::core::MatchEngine;
use crate::models::{
    CandidatePool, ErrorResponse, FindMatchesRequest, FindMatchesResponse, HealthResponse,
    SentJobsQuery, SentJobsResponse,
};
use crate::services::MatchStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
    pub store: Option<Arc<MatchStore>>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/find", web::post().to(find_matches))
        .route("/matches/sent", web::get().to(get_sent_jobs))
        .route("/circuits", web::get().to(get_circuits))
        .route("/circuits/reset", web::post().to(reset_circuits));
}

/// Health check endpoint
///
/// Degraded while any circuit is open or the match store is unreachable.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = match &state.store {
        Some(store) => store.health_check().await.unwrap_or(false),
        None => true,
    };
    let circuits = state.engine.circuit_states();
    let any_open = state.engine.circuits().any_open();

    let status = if store_healthy && !any_open { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        circuits,
        cache: state.engine.cache_stats(),
    })
}

/// Find matches endpoint
///
/// POST /api/v1/matches/find
///
/// Request body:
/// ```json
/// {
///   "user": { "email": "string", "target_cities": ["string"], ... },
///   "jobs": [{ "job_hash": "string", ... }],
///   "poolVersion": "string",
///   "deadlineMs": 2000,
///   "excludeJobHashes": ["string"],
///   "recordDelivery": false
/// }
/// ```
async fn find_matches(
    state: web::Data<AppState>,
    req: web::Json<FindMatchesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for find_matches request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let req = req.into_inner();
    let request_id = uuid::Uuid::new_v4();
    let email = req.user.email.clone();

    // Previously delivered jobs are never re-sent
    let mut excluded: Vec<String> = match &state.store {
        Some(store) => match store.sent_job_hashes(&email).await {
            Ok(hashes) => hashes,
            Err(e) => {
                tracing::warn!(
                    %request_id,
                    "Failed to fetch sent jobs for {}, proceeding without filtering: {}",
                    email,
                    e
                );
                vec![]
            }
        },
        None => vec![],
    };
    excluded.extend(req.exclude_job_hashes);

    let pool = build_pool(&req.pool_version, req.jobs, &excluded);
    tracing::info!(
        %request_id,
        user = %email,
        pool_version = %pool.version,
        candidates = pool.jobs.len(),
        excluded = excluded.len(),
        "Finding matches"
    );

    let deadline = req.deadline_ms.map(Duration::from_millis);
    let outcome = state.engine.find_matches(&req.user, &pool, deadline).await;

    if req.record_delivery && !outcome.results.is_empty() {
        if let Some(store) = &state.store {
            if let Err(e) = store.record_delivered(&outcome.results).await {
                tracing::warn!(%request_id, "Failed to record delivered matches for {}: {}", email, e);
            }
        }
    }

    tracing::info!(
        %request_id,
        "Returning {} matches for user {} via {} (from {} candidates)",
        outcome.results.len(),
        email,
        outcome.method,
        outcome.total_candidates
    );

    HttpResponse::Ok().json(FindMatchesResponse {
        matches: outcome.results,
        method: outcome.method,
        eligible_count: outcome.eligible_count,
        total_candidates: outcome.total_candidates,
    })
}

/// Drop excluded jobs and derive the pool version the cache keys on
///
/// Two requests over the same base pool but different exclusions must not
/// share cached results, so the exclusion set is folded into the version.
pub fn build_pool(
    base_version: &str,
    jobs: Vec<crate::models::JobPosting>,
    excluded: &[String],
) -> CandidatePool {
    let excluded: HashSet<&str> = excluded.iter().map(String::as_str).collect();
    let before = jobs.len();
    let jobs: Vec<_> = jobs
        .into_iter()
        .filter(|job| !excluded.contains(job.job_hash.as_str()))
        .collect();

    if jobs.len() == before {
        return CandidatePool::new(base_version, jobs);
    }

    let mut hashes: Vec<&str> = excluded.into_iter().collect();
    hashes.sort_unstable();
    let digest = Sha256::digest(hashes.join(",").as_bytes());
    let version = format!("{}+x{}", base_version, &hex::encode(digest)[..12]);
    CandidatePool::new(version, jobs)
}

/// Get previously delivered jobs for a subscriber
///
/// GET /api/v1/matches/sent?email={email}
async fn get_sent_jobs(
    state: web::Data<AppState>,
    query: web::Query<SentJobsQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let Some(store) = &state.store else {
        return HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: "Match store disabled".to_string(),
            message: "database.url is not configured".to_string(),
            status_code: 503,
        });
    };

    match store.sent_job_hashes(&query.email).await {
        Ok(job_hashes) => HttpResponse::Ok().json(SentJobsResponse {
            email: query.email.clone(),
            count: job_hashes.len(),
            job_hashes,
        }),
        Err(e) => {
            tracing::error!("Failed to fetch sent jobs for {}: {}", query.email, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch sent jobs".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

/// Current circuit breaker states
async fn get_circuits(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.engine.circuit_states())
}

/// Reset circuits, budget ledger and in-process cache
async fn reset_circuits(state: web::Data<AppState>) -> impl Responder {
    tracing::warn!("Engine state reset requested");
    state.engine.reset();
    HttpResponse::Ok().json(state.engine.circuit_states())
}
