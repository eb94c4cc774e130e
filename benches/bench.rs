// Criterion benchmarks for the match engine

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jobmatch::core::{
    calculate_rule_score, filter_eligible, semantic_similarity, MatchEngine, SemanticScorer,
    SemanticWeights,
};
use jobmatch::models::{
    CandidatePool, ExperienceLevel, FreshnessTier, JobPosting, ScoringWeights, SubscriptionTier,
    UserProfile, WorkEnvironment,
};
use std::sync::Arc;

const CITIES: [&str; 5] = ["London", "Manchester", "Dublin", "Berlin", "Paris"];

fn create_job(id: usize) -> JobPosting {
    JobPosting {
        job_hash: format!("job-{}", id),
        title: if id % 7 == 0 { "Senior Engineer" } else { "Graduate Engineer" }.to_string(),
        company: format!("Company {}", id % 40),
        city: CITIES[id % CITIES.len()].to_string(),
        country: "EU".to_string(),
        description: "Build data pipelines in Python and SQL for a fintech platform".to_string(),
        categories: vec!["software engineering".to_string(), "data".to_string()],
        experience_level: ExperienceLevel::Graduate,
        work_environment: WorkEnvironment::Hybrid,
        visa_friendly: id % 2 == 0,
        language_requirements: vec!["English".to_string()],
        posted_at: Utc::now() - Duration::hours((id % 200) as i64),
        freshness_tier: FreshnessTier::Fresh,
        active: id % 11 != 0,
    }
}

fn create_user() -> UserProfile {
    UserProfile {
        email: "bench@example.com".to_string(),
        target_cities: vec!["London".to_string(), "Dublin".to_string()],
        languages_spoken: vec!["English".to_string()],
        visa_status: "Requires sponsorship".to_string(),
        career_path: vec!["data".to_string()],
        experience_level: ExperienceLevel::Graduate,
        subscription_tier: SubscriptionTier::Premium,
        skills: vec!["python".to_string(), "sql".to_string()],
        industries: vec!["fintech".to_string()],
    }
}

fn bench_rule_score(c: &mut Criterion) {
    let user = create_user();
    let job = create_job(1);
    let weights = ScoringWeights::default();

    c.bench_function("rule_score", |b| {
        b.iter(|| calculate_rule_score(black_box(&user), black_box(&job), black_box(&weights)));
    });
}

fn bench_semantic_similarity(c: &mut Criterion) {
    let user = create_user();
    let job = create_job(1);
    let weights = SemanticWeights::default();

    c.bench_function("semantic_similarity", |b| {
        b.iter(|| semantic_similarity(black_box(&user), black_box(&job), black_box(&weights)));
    });
}

fn bench_filtering(c: &mut Criterion) {
    let user = create_user();
    let jobs: Vec<JobPosting> = (0..1000).map(create_job).collect();

    c.bench_function("filter_eligible_1000_jobs", |b| {
        b.iter(|| filter_eligible(black_box(&user), black_box(&jobs)));
    });
}

fn bench_matching(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to start tokio runtime");
    let engine = MatchEngine::builder()
        .tier(Arc::new(SemanticScorer::default()), std::time::Duration::from_secs(1))
        .build();
    let user = create_user();

    let mut group = c.benchmark_group("matching");

    for job_count in [10, 100, 500, 1000].iter() {
        let pool = CandidatePool::new(
            format!("bench-{}", job_count),
            (0..*job_count).map(create_job).collect(),
        );

        group.bench_with_input(BenchmarkId::new("find_matches", job_count), job_count, |b, _| {
            b.iter(|| runtime.block_on(engine.find_matches(black_box(&user), black_box(&pool), None)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_rule_score,
    bench_semantic_similarity,
    bench_filtering,
    bench_matching
);

criterion_main!(benches);
