//! Candidate strategies for free-text queries.
//!
//! Each strategy either produces candidates or explains why it could not.
//! The orchestrator tries them in order and takes the first success, so the
//! fallback chain is data rather than nested error handling.

use crate::error::SearchError;
use crate::semantic::IndexCache;
use crate::vector::{RankedCandidate, encode_with_timeout, rank};
use std::time::Duration;
use tracing::debug;

/// Candidate set produced for a free-text query.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidates {
    /// Ids by descending similarity
    Ranked(Vec<RankedCandidate>),
    /// Lowercased terms for substring matching
    Keywords(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Success(Candidates),
    Unavailable(String),
}

pub trait CandidateStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn candidates(&self, text: &str) -> StrategyOutcome;
}

/// Splits free text into lowercased whitespace-separated terms.
pub fn keyword_terms(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Ranks the whole index by similarity to the encoded query.
pub struct SemanticStrategy {
    cache: IndexCache,
    candidate_pool: usize,
    encode_timeout: Duration,
    build_timeout: Duration,
}

impl SemanticStrategy {
    pub fn new(
        cache: IndexCache,
        candidate_pool: usize,
        encode_timeout: Duration,
        build_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            candidate_pool: candidate_pool.max(1),
            encode_timeout,
            build_timeout,
        }
    }
}

impl CandidateStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn candidates(&self, text: &str) -> StrategyOutcome {
        let index = match self.cache.get_or_build_within(false, self.build_timeout) {
            Ok(index) => index,
            Err(e) => return StrategyOutcome::Unavailable(e.to_string()),
        };

        let query = match encode_with_timeout(self.cache.encoder(), text, self.encode_timeout) {
            Ok(query) => query,
            Err(e) => {
                let e: SearchError = e.into();
                return StrategyOutcome::Unavailable(e.to_string());
            }
        };

        match rank(&query, index.ids(), index.vectors(), self.candidate_pool) {
            Ok(ranked) if ranked.is_empty() => {
                StrategyOutcome::Unavailable("Ranking produced no candidates".to_string())
            }
            Ok(ranked) => {
                debug!(
                    candidates = ranked.len(),
                    top_score = ranked[0].score,
                    "Semantic ranking succeeded"
                );
                StrategyOutcome::Success(Candidates::Ranked(ranked))
            }
            Err(e) => StrategyOutcome::Unavailable(format!("Ranking failed: {e}")),
        }
    }
}

/// Case-insensitive substring matching over title, description and
/// location. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordStrategy;

impl CandidateStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn candidates(&self, text: &str) -> StrategyOutcome {
        StrategyOutcome::Success(Candidates::Keywords(keyword_terms(text)))
    }
}
