//! Record storage: the collaborator that owns listing attributes.
//!
//! The search core only reads records. A store answers three questions:
//! every record (for index rebuilds), records by id, and a filtered, ordered
//! candidate query for the orchestrator.

pub mod error;
pub mod import;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use import::{ImportReport, import_listings};
pub use memory::MemoryRecordStore;

use crate::search::{Predicate, SortKey};
use crate::types::{Record, RecordId};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Which records a query starts from before predicates apply.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateScope {
    All,
    /// Only the listed ids
    Ids(Vec<RecordId>),
    /// Records where every term is a case-insensitive substring of the
    /// title, description or location
    Keywords(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub scope: CandidateScope,
    pub predicates: Vec<Predicate>,
    pub sort: Option<SortKey>,
}

impl RecordQuery {
    pub fn all() -> Self {
        Self {
            scope: CandidateScope::All,
            predicates: Vec::new(),
            sort: None,
        }
    }
}

pub trait RecordStore: Send + Sync {
    fn list_all_records(&self) -> StoreResult<Vec<Record>>;

    /// Records for `ids`. Unknown ids are skipped; order is unspecified.
    fn get_by_ids(&self, ids: &[RecordId]) -> StoreResult<Vec<Record>>;

    /// Filtered records, in `sort` order when given and storage order
    /// otherwise.
    fn query(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let records = match &query.scope {
            CandidateScope::Ids(ids) => self.get_by_ids(ids)?,
            _ => self.list_all_records()?,
        };
        Ok(apply_query(records, query))
    }
}

/// Newest first (missing timestamps last), then higher ids first.
pub fn storage_order(a: &Record, b: &Record) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.id.cmp(&a.id))
}

/// True when every term occurs in at least one keyword field.
pub fn keyword_match(record: &Record, terms: &[String]) -> bool {
    let fields: Vec<String> = record.keyword_fields().map(str::to_lowercase).collect();
    terms.iter().all(|term| {
        let term = term.to_lowercase();
        fields.iter().any(|field| field.contains(&term))
    })
}

/// Applies scope, predicates and ordering to an in-memory record set.
pub fn apply_query(records: Vec<Record>, query: &RecordQuery) -> Vec<Record> {
    let id_set: Option<HashSet<RecordId>> = match &query.scope {
        CandidateScope::Ids(ids) => Some(ids.iter().copied().collect()),
        _ => None,
    };

    let mut matched: Vec<Record> = records
        .into_iter()
        .filter(|record| match &query.scope {
            CandidateScope::All => true,
            CandidateScope::Ids(_) => id_set.as_ref().is_some_and(|s| s.contains(&record.id)),
            CandidateScope::Keywords(terms) => keyword_match(record, terms),
        })
        .filter(|record| query.predicates.iter().all(|p| p.matches(record)))
        .collect();

    matched.sort_by(storage_order);
    if let Some(sort) = query.sort {
        // Stable: ties keep storage order
        matched.sort_by(|a, b| sort.compare(a, b));
    }
    matched
}
