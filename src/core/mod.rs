// Core algorithm exports
pub mod budget;
pub mod circuit;
pub mod filters;
pub mod matcher;
pub mod scorer;
pub mod scoring;
pub mod semantic;
pub mod validator;

pub use budget::{BudgetConfig, BudgetError, CostBudget};
pub use circuit::{CircuitBreaker, CircuitBreakers, CircuitConfig, CircuitState, CircuitStatus};
pub use filters::{check_eligibility, filter_eligible, FilterReport, Rejection};
pub use matcher::{MatchEngine, MatchEngineBuilder, MatchOutcome};
pub use scorer::{ScoreFailure, ScoredJob, Scorer};
pub use scoring::{calculate_rule_score, RuleBasedScorer};
pub use semantic::{semantic_similarity, SemanticScorer, SemanticWeights};
pub use validator::{CountPolicy, QualityValidator, ValidatedScore, ValidationReport};
