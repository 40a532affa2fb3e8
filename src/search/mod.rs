//! Request-facing search: query model, candidate strategies, orchestration
//! and pagination.

mod orchestrator;
mod page;
mod query;
mod strategy;

pub use orchestrator::{CandidateSource, SearchOrchestrator};
pub use page::SearchPage;
pub use query::{FilterField, FilterOp, FilterValue, Predicate, SearchQuery, SortKey};
pub use strategy::{
    CandidateStrategy, Candidates, KeywordStrategy, SemanticStrategy, StrategyOutcome,
    keyword_terms,
};
