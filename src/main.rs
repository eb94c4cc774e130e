use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use jobmatch::config::Settings;
use jobmatch::core::{CircuitBreakers, CostBudget, MatchEngine, RuleBasedScorer, SemanticScorer};
use jobmatch::models::Tier;
use jobmatch::routes::{self, AppState};
use jobmatch::services::{AiScorer, HttpLanguageModel, MatchStore, RedisCache, ResultCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_tracing(settings: &Settings) {
    // LOG_LEVEL / LOG_FORMAT win over the config file
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

async fn build_engine(settings: &Settings) -> std::io::Result<MatchEngine> {
    let tiers = settings
        .tier_order()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let weights = settings.scoring_weights();
    let ai_timeout = Duration::from_millis(settings.engine.ai_timeout_ms);
    let local_timeout = Duration::from_millis(settings.engine.semantic_timeout_ms);

    let mut builder = MatchEngine::builder()
        .circuits(CircuitBreakers::new(settings.circuit_config()))
        .budget(Arc::new(CostBudget::new(settings.budget_config())))
        .count_policy(settings.count_policy())
        .weights(weights);

    for tier in tiers {
        builder = match tier {
            Tier::Ai => {
                let Some(endpoint) = settings.ai.endpoint.clone() else {
                    warn!("AI tier configured but ai.endpoint is not set, skipping it");
                    continue;
                };
                match HttpLanguageModel::new(endpoint, settings.ai.api_key.clone(), ai_timeout) {
                    Ok(model) => {
                        let scorer = AiScorer::new(
                            Arc::new(model),
                            settings.ai.model.clone(),
                            settings.ai.batch_size,
                            settings.ai.max_tokens,
                        );
                        builder.tier(Arc::new(scorer), ai_timeout)
                    }
                    Err(e) => {
                        error!("Failed to build AI provider client ({}), skipping AI tier", e);
                        continue;
                    }
                }
            }
            Tier::Semantic => builder.tier(Arc::new(SemanticScorer::default()), local_timeout),
            Tier::RuleBased => builder.tier(Arc::new(RuleBasedScorer::new(weights)), local_timeout),
        };
    }

    let cache = ResultCache::new(settings.cache.l1_cache_size, settings.cache.ttl_secs);
    let cache = match &settings.cache.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(remote) => {
                info!("Redis result cache connected");
                cache.with_remote(Arc::new(remote))
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process cache only", e);
                cache
            }
        },
        None => cache,
    };
    info!(
        "Result cache initialized (L1: {} entries, TTL: {}s)",
        settings.cache.l1_cache_size, settings.cache.ttl_secs
    );

    Ok(builder.cache(Arc::new(cache)).build())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_tracing(&settings);
    info!("Starting job match service...");

    let engine = Arc::new(build_engine(&settings).await?);
    info!(
        "Match engine initialized with tiers {:?}, n_free={}, n_premium={}",
        engine.tier_order(),
        settings.engine.n_free,
        settings.engine.n_premium
    );

    let store = match &settings.database.url {
        Some(url) => {
            let max_conn = settings.database.max_connections.unwrap_or(10);
            let min_conn = settings.database.min_connections.unwrap_or(1);
            match MatchStore::new(url, max_conn, min_conn).await {
                Ok(store) => {
                    info!("PostgreSQL match store initialized (max: {} connections)", max_conn);
                    Some(Arc::new(store))
                }
                Err(e) => {
                    error!("Failed to connect to PostgreSQL ({}), running without match store", e);
                    None
                }
            }
        }
        None => None,
    };

    let app_state = AppState {
        engine: engine.clone(),
        store,
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(4 * 1024 * 1024).error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    engine.shutdown();
    result
}
