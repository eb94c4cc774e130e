// Service exports
pub mod ai;
pub mod cache;
pub mod postgres;

pub use ai::{AiScorer, HttpLanguageModel, LanguageModel, ProviderResponse, ScoreBatchRequest};
pub use cache::{CacheEntry, CacheError, CacheKey, CacheStats, RedisCache, RemoteCache, ResultCache};
pub use postgres::{MatchStore, StoreError};
