use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

use crate::core::{BudgetConfig, CircuitConfig, CountPolicy};
use crate::models::{ScoringWeights, Tier};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub circuit: CircuitSettings,
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default)]
    pub budget: BudgetSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Tier order, e.g. ["ai", "semantic", "rule_based"]
    #[serde(default = "default_tiers")]
    pub tiers: Vec<String>,
    #[serde(default = "default_n_free")]
    pub n_free: usize,
    #[serde(default = "default_n_premium")]
    pub n_premium: usize,
    #[serde(default = "default_ai_timeout_ms")]
    pub ai_timeout_ms: u64,
    #[serde(default = "default_semantic_timeout_ms")]
    pub semantic_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            n_free: default_n_free(),
            n_premium: default_n_premium(),
            ai_timeout_ms: default_ai_timeout_ms(),
            semantic_timeout_ms: default_semantic_timeout_ms(),
        }
    }
}

fn default_tiers() -> Vec<String> {
    vec!["ai".to_string(), "semantic".to_string(), "rule_based".to_string()]
}
fn default_n_free() -> usize { 5 }
fn default_n_premium() -> usize { 10 }
fn default_ai_timeout_ms() -> u64 { 8_000 }
fn default_semantic_timeout_ms() -> u64 { 1_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_secs: default_window_secs(),
            cooldown_secs: default_cooldown_secs(),
            success_threshold: default_success_threshold(),
        }
    }
}

fn default_failure_threshold() -> u32 { 5 }
fn default_window_secs() -> u64 { 60 }
fn default_cooldown_secs() -> u64 { 30 }
fn default_success_threshold() -> u32 { 2 }

#[derive(Debug, Clone, Deserialize)]
pub struct AiSettings {
    /// Provider endpoint; the AI tier is disabled when unset
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cost_per_call_usd")]
    pub cost_per_call_usd: f64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
            cost_per_call_usd: default_cost_per_call_usd(),
        }
    }
}

fn default_model() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> u32 { 2_000 }
fn default_batch_size() -> usize { 25 }
fn default_cost_per_call_usd() -> f64 { 0.002 }

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetSettings {
    #[serde(default = "default_per_user_daily_calls")]
    pub per_user_daily_calls: u32,
    #[serde(default = "default_daily_cost_ceiling_usd")]
    pub daily_cost_ceiling_usd: f64,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            per_user_daily_calls: default_per_user_daily_calls(),
            daily_cost_ceiling_usd: default_daily_cost_ceiling_usd(),
        }
    }
}

fn default_per_user_daily_calls() -> u32 { 10 }
fn default_daily_cost_ceiling_usd() -> f64 { 20.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Shared L2 store; only the in-process cache is used when unset
    pub redis_url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_l1_cache_size")]
    pub l1_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_ttl_secs(),
            l1_cache_size: default_l1_cache_size(),
        }
    }
}

fn default_ttl_secs() -> u64 { 3_600 }
fn default_l1_cache_size() -> u64 { 10_000 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    /// Delivered-match store; disabled when unset
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_city_weight")]
    pub city: f64,
    #[serde(default = "default_career_path_weight")]
    pub career_path: f64,
    #[serde(default = "default_visa_weight")]
    pub visa: f64,
    #[serde(default = "default_language_weight")]
    pub language: f64,
    #[serde(default = "default_freshness_weight")]
    pub freshness: f64,
    #[serde(default = "default_level_weight")]
    pub level: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            city: default_city_weight(),
            career_path: default_career_path_weight(),
            visa: default_visa_weight(),
            language: default_language_weight(),
            freshness: default_freshness_weight(),
            level: default_level_weight(),
        }
    }
}

fn default_city_weight() -> f64 { 25.0 }
fn default_career_path_weight() -> f64 { 25.0 }
fn default_visa_weight() -> f64 { 10.0 }
fn default_language_weight() -> f64 { 10.0 }
fn default_freshness_weight() -> f64 { 15.0 }
fn default_level_weight() -> f64 { 15.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with JOBMATCH__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., JOBMATCH__ENGINE__N_FREE -> engine.n_free
            .add_source(env_source())
            .build()?;

        let settings = substitute_env_vars(settings)?;
        let settings: Self = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.n_free == 0 || self.engine.n_premium < self.engine.n_free {
            return Err(ConfigError::Message(format!(
                "engine.n_premium ({}) must be >= engine.n_free ({}) > 0",
                self.engine.n_premium, self.engine.n_free
            )));
        }
        if self.circuit.failure_threshold == 0 || self.circuit.success_threshold == 0 {
            return Err(ConfigError::Message(
                "circuit thresholds must be positive".to_string(),
            ));
        }
        if self.ai.batch_size == 0 {
            return Err(ConfigError::Message("ai.batch_size must be positive".to_string()));
        }
        self.tier_order().map(|_| ())
    }

    /// Configured tier order, ending at the first rule_based entry
    pub fn tier_order(&self) -> Result<Vec<Tier>, ConfigError> {
        let mut order = Vec::new();
        for name in &self.engine.tiers {
            let tier: Tier = name.parse().map_err(ConfigError::Message)?;
            if order.contains(&tier) {
                return Err(ConfigError::Message(format!("tier {} listed twice", tier)));
            }
            order.push(tier);
            if tier == Tier::RuleBased {
                break;
            }
        }
        Ok(order)
    }

    pub fn circuit_config(&self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.circuit.failure_threshold,
            failure_window: Duration::from_secs(self.circuit.window_secs),
            cooldown: Duration::from_secs(self.circuit.cooldown_secs),
            success_threshold: self.circuit.success_threshold,
        }
    }

    pub fn budget_config(&self) -> BudgetConfig {
        BudgetConfig {
            per_user_daily_calls: self.budget.per_user_daily_calls,
            daily_cost_ceiling_usd: self.budget.daily_cost_ceiling_usd,
            cost_per_call_usd: self.ai.cost_per_call_usd,
        }
    }

    pub fn count_policy(&self) -> CountPolicy {
        CountPolicy {
            free: self.engine.n_free,
            premium: self.engine.n_premium,
        }
    }

    pub fn scoring_weights(&self) -> ScoringWeights {
        let w = &self.scoring.weights;
        ScoringWeights {
            city: w.city,
            career_path: w.career_path,
            visa: w.visa,
            language: w.language,
            freshness: w.freshness,
            level: w.level,
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("JOBMATCH")
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("engine.tiers")
        .try_parsing(true)
}

/// Apply the conventional unprefixed variables
///
/// DATABASE_URL, REDIS_URL and AI_API_KEY are honoured when the prefixed
/// form is not set.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("database.url", "DATABASE_URL", "JOBMATCH__DATABASE__URL"),
        ("cache.redis_url", "REDIS_URL", "JOBMATCH__CACHE__REDIS_URL"),
        ("ai.api_key", "AI_API_KEY", "JOBMATCH__AI__API_KEY"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (key, plain, prefixed) in overrides {
        if env::var(prefixed).is_ok() {
            continue;
        }
        if let Ok(value) = env::var(plain) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
