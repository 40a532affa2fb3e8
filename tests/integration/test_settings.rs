//! Settings files driving search behavior.

use crate::common::{VocabularyEncoder, cache_with, sample_store};
use inmofinder::search::CandidateSource;
use inmofinder::{SearchOrchestrator, SearchQuery, Settings};
use std::sync::Arc;
use tempfile::TempDir;

fn load(dir: &TempDir, toml: &str) -> Settings {
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, toml).unwrap();
    Settings::load_from(&path).unwrap()
}

#[test]
fn test_candidate_pool_limits_ranked_results() {
    let dir = TempDir::new().unwrap();
    let settings = load(&dir, "[semantic_search]\ncandidate_pool = 2\n");
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache));

    let (page, source) = orchestrator
        .search_explained(&SearchQuery::new(12).with_text("casa con piscina"))
        .unwrap();

    assert_eq!(source, CandidateSource::Ranked);
    assert_eq!(page.total_count, 2);
    assert_eq!(page.items[0].id.value(), 1);
}

#[test]
fn test_disabled_in_file_means_keyword_only() {
    let dir = TempDir::new().unwrap();
    let settings = load(&dir, "[semantic_search]\nenabled = false\n");
    let records = Arc::new(sample_store());
    let cache = cache_with(&dir, records.clone(), Arc::new(VocabularyEncoder));
    let orchestrator = SearchOrchestrator::from_settings(&settings, records, Some(cache));

    let (page, source) = orchestrator
        .search_explained(&SearchQuery::new(12).with_text("finca"))
        .unwrap();

    assert_eq!(source, CandidateSource::Keyword);
    assert_eq!(page.items.len(), 1);
}

#[test]
fn test_page_size_clamped_to_configured_maximum() {
    let dir = TempDir::new().unwrap();
    let settings = load(&dir, "[search]\npage_size = 3\nmax_page_size = 4\n");

    let default = SearchQuery::from_query_string("q=casa", &settings.search).unwrap();
    assert_eq!(default.page_size, 3);

    let clamped = SearchQuery::from_query_string("page_size=50", &settings.search).unwrap();
    assert_eq!(clamped.page_size, 4);
}
