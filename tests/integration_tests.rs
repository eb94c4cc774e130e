// Integration tests for the HTTP surface

use actix_web::{test, web, App};
use jobmatch::core::MatchEngine;
use jobmatch::models::{FindMatchesResponse, HealthResponse, MatchMethod};
use jobmatch::routes::{self, AppState};
use jobmatch::services::ResultCache;
use serde_json::{json, Value};
use std::sync::Arc;

fn app_state() -> AppState {
    let engine = MatchEngine::builder()
        .cache(Arc::new(ResultCache::new(100, 60)))
        .build();
    AppState {
        engine: Arc::new(engine),
        store: None,
    }
}

fn job_json(hash: &str, city: &str, visa_friendly: bool) -> Value {
    json!({
        "job_hash": hash,
        "title": "Graduate Marketing Associate",
        "company": "Contoso",
        "city": city,
        "country": "UK",
        "description": "Campaign planning and analytics",
        "categories": ["marketing"],
        "experience_level": "graduate",
        "work_environment": "hybrid",
        "visa_friendly": visa_friendly,
        "language_requirements": ["English"],
        "posted_at": "2024-03-01T09:00:00Z",
        "freshness_tier": "fresh",
        "active": true
    })
}

fn find_body(pool_version: &str, exclude: &[&str]) -> Value {
    let mut jobs: Vec<Value> = (0..6).map(|i| job_json(&format!("lon-{}", i), "London", true)).collect();
    jobs.extend((0..4).map(|i| job_json(&format!("par-{}", i), "Paris", true)));

    json!({
        "user": {
            "email": "riley@example.com",
            "target_cities": ["London"],
            "languages_spoken": ["English"],
            "visa_status": "EU citizen",
            "career_path": ["marketing"],
            "experience_level": "graduate",
            "subscription_tier": "free"
        },
        "jobs": jobs,
        "poolVersion": pool_version,
        "excludeJobHashes": exclude
    })
}

#[actix_web::test]
async fn test_health_reports_circuits() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp: HealthResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp.status, "healthy");
    assert_eq!(resp.circuits.len(), 2);

    let cache = resp.cache.expect("cache stats reported");
    assert_eq!(cache.ttl_secs, 60);
    assert!(!cache.remote_enabled);
}

#[actix_web::test]
async fn test_find_matches_end_to_end() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(find_body("2024-w09", &[]))
        .to_request();
    let first: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(first.matches.len(), 5);
    assert_eq!(first.method, MatchMethod::RuleBased);
    assert_eq!(first.eligible_count, 6);
    assert_eq!(first.total_candidates, 10);
    assert!(first.matches.iter().all(|m| m.job_hash.starts_with("lon-")));

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(find_body("2024-w09", &[]))
        .to_request();
    let second: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(second.method, MatchMethod::Cached);
    assert_eq!(second.matches.len(), 5);
}

#[actix_web::test]
async fn test_excluded_jobs_are_not_returned_or_served_from_cache() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(find_body("2024-w10", &[]))
        .to_request();
    let _: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(find_body("2024-w10", &["lon-0", "lon-1"]))
        .to_request();
    let resp: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

    assert_ne!(resp.method, MatchMethod::Cached);
    assert_eq!(resp.matches.len(), 4);
    assert!(resp.matches.iter().all(|m| m.job_hash != "lon-0" && m.job_hash != "lon-1"));
}

#[actix_web::test]
async fn test_invalid_request_is_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let mut body = find_body("", &[]);
    body["user"]["email"] = json!("not-an-email");

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_sent_jobs_unavailable_without_store() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/matches/sent?email=riley@example.com")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 503);
}

#[actix_web::test]
async fn test_circuit_reset_endpoint() {
    let state = app_state();
    let engine = state.engine.clone();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure_routes),
    )
    .await;

    let ai = engine.circuits().get(jobmatch::models::Tier::Ai).unwrap();
    for _ in 0..5 {
        ai.record_failure();
    }

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let health: HealthResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(health.status, "degraded");

    let req = test::TestRequest::post().uri("/api/v1/circuits/reset").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(!engine.circuits().any_open());
}
