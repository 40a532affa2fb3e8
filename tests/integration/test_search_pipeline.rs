//! End-to-end searches through the orchestrator with a real index cache.

use crate::common::{FailingEncoder, VocabularyEncoder, cache_with, sample_store};
use inmofinder::search::CandidateSource;
use inmofinder::{SearchError, SearchOrchestrator, SearchQuery, Settings};
use std::sync::Arc;
use tempfile::TempDir;

fn ids(page: &inmofinder::SearchPage) -> Vec<u32> {
    page.items.iter().map(|r| r.id.value()).collect()
}

#[test]
fn test_ranked_order_preserved_under_filtering() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    let settings = Settings::default();
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache));

    let query =
        SearchQuery::from_query_string("q=casa+con+piscina&price_max=900000000", &settings.search)
            .unwrap();
    let (page, source) = orchestrator.search_explained(&query).unwrap();

    assert_eq!(source, CandidateSource::Ranked);
    // Finca (1.2B) is filtered out; the rest keep similarity order
    assert_eq!(ids(&page), vec![1, 3, 2, 5]);
}

#[test]
fn test_explicit_sort_overrides_similarity() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    let settings = Settings::default();
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache));

    let query =
        SearchQuery::from_query_string("q=piscina&sort=price_desc", &settings.search).unwrap();
    let page = orchestrator.search(&query).unwrap();

    assert_eq!(ids(&page), vec![4, 1, 3, 2, 5]);
}

#[test]
fn test_encoder_failure_falls_back_to_keywords() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(FailingEncoder));
    let settings = Settings::default();
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache));

    let query = SearchQuery::new(12).with_text("pool house");
    let (page, source) = orchestrator.search_explained(&query).unwrap();

    assert_eq!(source, CandidateSource::Keyword);
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].title.as_deref(), Some("House with a pool"));
}

#[test]
fn test_semantic_disabled_never_touches_index() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    let mut settings = Settings::default();
    settings.semantic_search.enabled = false;
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache.clone()));

    let (page, source) = orchestrator
        .search_explained(&SearchQuery::new(12).with_text("apartment"))
        .unwrap();

    assert_eq!(source, CandidateSource::Keyword);
    assert_eq!(ids(&page), vec![2]);
    assert_eq!(cache.build_count(), 0);
    assert!(!cache.store_status().present);
}

#[test]
fn test_no_text_lists_everything_with_filters() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    let settings = Settings::default();
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache.clone()));

    let query = SearchQuery::from_query_string("pets=1", &settings.search).unwrap();
    let (page, source) = orchestrator.search_explained(&query).unwrap();

    assert_eq!(source, CandidateSource::AllRecords);
    assert_eq!(ids(&page), vec![5]);
    assert_eq!(cache.build_count(), 0);
}

#[test]
fn test_page_beyond_end_serves_last_page() {
    let dir = TempDir::new().unwrap();
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    let settings = Settings::default();
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache));

    let query =
        SearchQuery::from_query_string("sort=price_asc&page=99&page_size=2", &settings.search)
            .unwrap();
    let page = orchestrator.search(&query).unwrap();

    assert_eq!(page.page, 3);
    assert_eq!(page.num_pages, 3);
    assert_eq!(ids(&page), vec![4]);
    assert!(page.has_previous);
    assert!(!page.has_next);
}

#[test]
fn test_invalid_filter_values_are_rejected() {
    let config = Settings::default().search;

    for (qs, field) in [
        ("q=casa&price_max=abc", "price_max"),
        ("area_min=-10", "area_min"),
        ("rooms=2.5", "rooms"),
    ] {
        match SearchQuery::from_query_string(qs, &config) {
            Err(SearchError::InvalidFilterValue { field: got, .. }) => assert_eq!(got, field),
            other => panic!("{qs}: expected InvalidFilterValue, got {other:?}"),
        }
    }
}
