//! Search orchestrator: the request-facing entry point.
//!
//! Per request:
//! 1. No free text: every record is a candidate.
//! 2. Free text: strategies run in order until one yields candidates. When
//!    all are unavailable, keyword matching is used.
//! 3. The record store applies attribute filters and, if requested, the
//!    explicit sort.
//! 4. Without an explicit sort, ranked results keep their rank order.
//! 5. The ordered set is paginated.

use crate::config::Settings;
use crate::error::SearchResult;
use crate::search::{
    CandidateStrategy, Candidates, KeywordStrategy, SearchPage, SearchQuery, SemanticStrategy,
    StrategyOutcome, keyword_terms,
};
use crate::semantic::IndexCache;
use crate::storage::{CandidateScope, RecordQuery, RecordStore};
use crate::types::{Record, RecordId};
use crate::vector::RankedCandidate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which path produced the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    AllRecords,
    Ranked,
    Keyword,
}

pub struct SearchOrchestrator {
    records: Arc<dyn RecordStore>,
    strategies: Vec<Box<dyn CandidateStrategy>>,
}

impl SearchOrchestrator {
    pub fn new(records: Arc<dyn RecordStore>, strategies: Vec<Box<dyn CandidateStrategy>>) -> Self {
        Self {
            records,
            strategies,
        }
    }

    /// Semantic ranking followed by keyword matching, or keyword matching
    /// alone when semantic search is disabled or no cache is given.
    pub fn from_settings(
        settings: &Settings,
        records: Arc<dyn RecordStore>,
        cache: Option<IndexCache>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn CandidateStrategy>> = Vec::with_capacity(2);
        let semantic = &settings.semantic_search;

        match cache {
            Some(cache) if semantic.enabled => {
                strategies.push(Box::new(SemanticStrategy::new(
                    cache,
                    semantic.candidate_pool,
                    semantic.encode_timeout(),
                    semantic.build_timeout(),
                )));
            }
            _ => debug!("Semantic search disabled, using keyword matching only"),
        }
        strategies.push(Box::new(KeywordStrategy));

        Self::new(records, strategies)
    }

    pub fn search(&self, query: &SearchQuery) -> SearchResult<SearchPage> {
        self.search_explained(query).map(|(page, _)| page)
    }

    /// Runs a search and reports which candidate path served it.
    pub fn search_explained(
        &self,
        query: &SearchQuery,
    ) -> SearchResult<(SearchPage, CandidateSource)> {
        let started = Instant::now();

        let (scope, ranking, source) = match query.text.as_deref() {
            None => (CandidateScope::All, None, CandidateSource::AllRecords),
            Some(text) => match self.resolve_candidates(text) {
                Candidates::Ranked(ranked) => {
                    let ids = ranked.iter().map(|c| c.id).collect();
                    (CandidateScope::Ids(ids), Some(ranked), CandidateSource::Ranked)
                }
                Candidates::Keywords(terms) => (
                    CandidateScope::Keywords(terms),
                    None,
                    CandidateSource::Keyword,
                ),
            },
        };

        let records = self.records.query(&RecordQuery {
            scope,
            predicates: query.predicates.clone(),
            sort: query.sort,
        })?;

        let ordered = match (query.sort, ranking) {
            (None, Some(ranked)) => order_by_rank(records, &ranked),
            _ => records,
        };

        let page = SearchPage::paginate(ordered, query.page, query.page_size);
        info!(
            source = ?source,
            total = page.total_count,
            page = page.page,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok((page, source))
    }

    fn resolve_candidates(&self, text: &str) -> Candidates {
        for strategy in &self.strategies {
            match strategy.candidates(text) {
                StrategyOutcome::Success(candidates) => {
                    debug!(strategy = strategy.name(), "Strategy produced candidates");
                    return candidates;
                }
                StrategyOutcome::Unavailable(reason) => {
                    warn!(strategy = strategy.name(), %reason, "Strategy unavailable, falling back");
                }
            }
        }
        Candidates::Keywords(keyword_terms(text))
    }
}

/// Reorders filtered records to follow the ranking.
fn order_by_rank(mut records: Vec<Record>, ranked: &[RankedCandidate]) -> Vec<Record> {
    let position: HashMap<RecordId, usize> = ranked
        .iter()
        .enumerate()
        .map(|(i, candidate)| (candidate.id, i))
        .collect();
    records.sort_by_key(|record| position.get(&record.id).copied().unwrap_or(usize::MAX));
    records
}
