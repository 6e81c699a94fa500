//! Integration tests for paper-enrich
//!
//! These tests run whole batches against real CSV files, with either the mock
//! backend or an HTTP backend pointed at a local mock server.

use paper_enrich::config::{EnrichSettings, LookupSettings, MatchSettings, RetrySettings, Settings};
use paper_enrich::driver::{EnrichError, EnrichmentDriver};
use paper_enrich::lookup::mock::make_candidate;
use paper_enrich::lookup::{LookupClient, LookupError, MockLookup};
use paper_enrich::matching::MatchResolver;
use paper_enrich::models::{CandidateBuilder, CandidateField, RowState};
use paper_enrich::store::{CsvStore, RecordStore};
use paper_enrich::utils::{row_number, RetryConfig, RowSelection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const DATASET: &str = "paper_title,authors,year\n\
    Attention Is All You Need,Vaswani; Shazeer,2017\n\
    Deep Residual Learning for Image Recognition,He; Zhang,2016\n\
    An Unknown Workshop Paper,Nobody,2020\n";

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(10),
    }
}

fn dataset(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("papers.csv");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

fn enrich_settings() -> EnrichSettings {
    EnrichSettings {
        output_fields: vec![
            CandidateField::PaperId,
            CandidateField::Doi,
            CandidateField::Venue,
        ],
        ..EnrichSettings::default()
    }
}

fn mock_with_known_papers() -> Arc<MockLookup> {
    let mock = Arc::new(MockLookup::new());
    mock.add_response(
        "Attention Is All You Need",
        vec![CandidateBuilder::new("204e3073", "Attention is All you Need", "mock")
            .authors(["Ashish Vaswani", "Noam Shazeer"])
            .year(2017)
            .doi("10.5555/3295222.3295349")
            .venue("NeurIPS")
            .build()],
    );
    mock.add_response(
        "Deep Residual Learning for Image Recognition",
        vec![CandidateBuilder::new(
            "2c03df8b",
            "Deep Residual Learning for Image Recognition",
            "mock",
        )
        .authors(["Kaiming He", "X. Zhang"])
        .year(2016)
        .doi("10.1109/CVPR.2016.90")
        .venue("CVPR")
        .build()],
    );
    mock
}

fn csv_driver(mock: &Arc<MockLookup>, path: &Path) -> EnrichmentDriver<CsvStore> {
    let store = CsvStore::open(path, b',').unwrap();
    let client = LookupClient::new(mock.clone(), fast_retry());
    EnrichmentDriver::new(
        store,
        client,
        MatchResolver::new(MatchSettings::default()),
        enrich_settings(),
    )
}

fn reopen(path: &Path) -> CsvStore {
    CsvStore::open(path, b',').unwrap()
}

#[tokio::test]
async fn test_enrich_csv_end_to_end() {
    let (_dir, path) = dataset(DATASET);
    let mock = mock_with_known_papers();
    let mut driver = csv_driver(&mock, &path);

    let report = driver.run(&RowSelection::all()).await.unwrap();

    assert_eq!(report.accepted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.outcome(2).unwrap().state, RowState::Failed);

    let store = reopen(&path);
    assert_eq!(
        store.columns(),
        [
            "paper_title",
            "authors",
            "year",
            "paperId",
            "doi",
            "venue",
            "enrichment_status"
        ]
    );
    assert_eq!(store.cell(0, "paperId"), Some("204e3073"));
    assert_eq!(store.cell(1, "doi"), Some("10.1109/cvpr.2016.90"));
    assert_eq!(store.cell(1, "enrichment_status"), Some("matched"));
    assert_eq!(store.cell(2, "paperId"), Some(""));
    assert_eq!(
        store.cell(2, "enrichment_status"),
        Some("UNRESOLVED: no match (best score 0.00)")
    );
    assert_eq!(store.cell(2, "authors"), Some("Nobody"));
}

#[tokio::test]
async fn test_rerun_only_touches_unresolved_rows() {
    let (_dir, path) = dataset(DATASET);
    let mock = mock_with_known_papers();

    csv_driver(&mock, &path).run(&RowSelection::all()).await.unwrap();
    let after_first = std::fs::read_to_string(&path).unwrap();
    let calls = mock.calls();

    let report = csv_driver(&mock, &path)
        .run(&RowSelection::all())
        .await
        .unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(mock.calls(), calls + 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
}

#[tokio::test]
async fn test_interrupted_batch_resumes_where_it_stopped() {
    let (_dir, path) = dataset(DATASET);
    let mock = mock_with_known_papers();

    // First run stops after the first data row, as if the process had been killed
    csv_driver(&mock, &path)
        .run(&RowSelection::single(2))
        .await
        .unwrap();
    assert_eq!(reopen(&path).cell(0, "enrichment_status"), Some("matched"));
    assert_eq!(reopen(&path).cell(1, "enrichment_status"), Some(""));

    let report = csv_driver(&mock, &path)
        .run(&RowSelection::all())
        .await
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.accepted, 1);
    assert_eq!(reopen(&path).cell(1, "paperId"), Some("2c03df8b"));
}

#[tokio::test]
async fn test_every_row_ends_matched_or_sentinel_never_both() {
    let (_dir, path) = dataset(DATASET);
    let mock = mock_with_known_papers();
    mock.fail_next(LookupError::Network("connection reset".into()));
    mock.fail_next(LookupError::Network("connection reset".into()));
    mock.fail_next(LookupError::Network("connection reset".into()));

    let report = csv_driver(&mock, &path)
        .run(&RowSelection::all())
        .await
        .unwrap();
    assert_eq!(report.processed(), 3);

    let store = reopen(&path);
    for index in 0..store.len() {
        let status = store.cell(index, "enrichment_status").unwrap();
        let outputs_filled = ["paperId", "doi", "venue"]
            .iter()
            .any(|c| !store.cell(index, c).unwrap().is_empty());

        if status == "matched" {
            assert!(outputs_filled, "row {} matched without outputs", row_number(index));
        } else {
            assert!(status.starts_with("UNRESOLVED: "));
            assert!(!outputs_filled, "row {} has both outputs and a sentinel", row_number(index));
        }
    }
    assert_eq!(
        store.cell(0, "enrichment_status"),
        Some("UNRESOLVED: lookup unavailable after 3 attempts")
    );
}

#[tokio::test]
async fn test_copy_mode_writes_timestamped_file() {
    let (dir, path) = dataset(DATASET);
    let mock = mock_with_known_papers();
    let store = CsvStore::open_copy(&path, b',').unwrap();
    let target = store.path().to_path_buf();
    let mut driver = EnrichmentDriver::new(
        store,
        LookupClient::new(mock.clone(), fast_retry()),
        MatchResolver::new(MatchSettings::default()),
        enrich_settings(),
    );

    driver.run(&RowSelection::all()).await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), DATASET);
    assert_eq!(target.parent(), Some(dir.path()));
    let name = target.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("papers_enriched_"));
    assert!(name.ends_with(".csv"));
    assert_eq!(reopen(&target).cell(0, "venue"), Some("NeurIPS"));
}

#[tokio::test]
async fn test_duplicate_headers_abort_before_any_lookup() {
    let (_dir, path) = dataset("paper_title,paperId,paperId\nA,,\n");
    assert!(CsvStore::open(&path, b',').is_err());
}

#[tokio::test]
async fn test_missing_title_column_is_reported() {
    let (_dir, path) = dataset("Title,year\nAttention Is All You Need,2017\n");
    let mock = Arc::new(MockLookup::new());

    let err = csv_driver(&mock, &path)
        .run(&RowSelection::all())
        .await
        .unwrap_err();
    assert!(matches!(err, EnrichError::MissingColumn(_)));
    assert_eq!(mock.calls(), 0);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Title,year\nAttention Is All You Need,2017\n"
    );
}

#[tokio::test]
async fn test_mock_candidate_helper() {
    let (_dir, path) = dataset("paper_title\nGraph Attention Networks\n");
    let mock = Arc::new(MockLookup::new());
    mock.add_response(
        "Graph Attention Networks",
        vec![make_candidate("gat", "Graph Attention Networks")],
    );
    let settings = EnrichSettings {
        output_fields: vec![CandidateField::Url],
        ..EnrichSettings::default()
    };
    let mut driver = EnrichmentDriver::new(
        CsvStore::open(&path, b',').unwrap(),
        LookupClient::new(mock, fast_retry()),
        MatchResolver::new(MatchSettings::default()),
        settings,
    );

    driver.run(&RowSelection::all()).await.unwrap();
    assert_eq!(reopen(&path).cell(0, "url"), Some("http://example.com/gat"));
}

// ===== HTTP backends against a local mock server =====

fn http_settings(backend: &str, base_url: String) -> (LookupSettings, RetrySettings) {
    let lookup = LookupSettings {
        backend: backend.to_string(),
        base_url: Some(base_url),
        semantic_scholar_api_key: None,
        crossref_mailto: None,
        requests_per_second: 0.0,
        ..LookupSettings::default()
    };
    let retry = RetrySettings {
        max_attempts: 2,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        ..RetrySettings::default()
    };
    (lookup, retry)
}

#[tokio::test]
async fn test_semantic_scholar_batch_over_http() {
    let mut server = mockito::Server::new_async().await;
    let found = server
        .mock("GET", "/paper/search")
        .match_query(mockito::Matcher::UrlEncoded(
            "query".into(),
            "Attention Is All You Need".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"total": 1, "offset": 0, "data": [{
                "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
                "externalIds": {"DOI": "10.5555/3295222.3295349"},
                "title": "Attention is All you Need",
                "venue": "Neural Information Processing Systems",
                "year": 2017,
                "citationCount": 120000,
                "authors": [{"name": "Ashish Vaswani"}]
            }]}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let unavailable = server
        .mock("GET", "/paper/search")
        .match_query(mockito::Matcher::UrlEncoded(
            "query".into(),
            "Deep Residual Learning for Image Recognition".into(),
        ))
        .with_status(503)
        .expect(2)
        .create_async()
        .await;
    let empty = server
        .mock("GET", "/paper/search")
        .match_query(mockito::Matcher::UrlEncoded(
            "query".into(),
            "An Unknown Workshop Paper".into(),
        ))
        .with_status(200)
        .with_body(r#"{"total": 0, "offset": 0, "data": []}"#)
        .create_async()
        .await;

    let (_dir, path) = dataset(DATASET);
    let (lookup, retry) = http_settings("semantic", server.url());
    let client = LookupClient::from_settings(&lookup, &retry).unwrap();
    let mut driver = EnrichmentDriver::new(
        CsvStore::open(&path, b',').unwrap(),
        client,
        MatchResolver::new(MatchSettings::default()),
        EnrichSettings {
            output_fields: vec![CandidateField::PaperId, CandidateField::CitationCount],
            ..EnrichSettings::default()
        },
    );

    let report = driver.run(&RowSelection::all()).await.unwrap();

    found.assert_async().await;
    unavailable.assert_async().await;
    empty.assert_async().await;
    assert_eq!(report.accepted, 1);
    assert_eq!(report.failed, 2);

    let store = reopen(&path);
    assert_eq!(
        store.cell(0, "paperId"),
        Some("204e3073870fae3d05bcbc2f6a8e263d9b72e776")
    );
    assert_eq!(store.cell(0, "citationCount"), Some("120000"));
    assert_eq!(
        store.cell(1, "enrichment_status"),
        Some("UNRESOLVED: lookup unavailable after 2 attempts")
    );
}

#[tokio::test]
async fn test_unauthorized_backend_aborts_batch() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/works")
        .match_query(mockito::Matcher::Any)
        .with_status(401)
        .with_body("invalid token")
        .expect(1)
        .create_async()
        .await;

    let (_dir, path) = dataset(DATASET);
    let (lookup, retry) = http_settings("crossref", server.url());
    let client = LookupClient::from_settings(&lookup, &retry).unwrap();
    let mut driver = EnrichmentDriver::new(
        CsvStore::open(&path, b',').unwrap(),
        client,
        MatchResolver::new(MatchSettings::default()),
        enrich_settings(),
    );

    let err = driver.run(&RowSelection::all()).await.unwrap_err();
    assert!(matches!(
        err,
        EnrichError::Lookup(LookupError::Unauthorized(_))
    ));
    assert_eq!(reopen(&path).cell(0, "enrichment_status"), Some(""));
}

#[test]
fn test_default_settings_round_trip_through_toml() {
    let settings = Settings::default();
    let text = settings.to_toml().unwrap();
    let parsed: Settings = toml::from_str(&text).unwrap();
    assert_eq!(parsed.enrich, settings.enrich);
    assert_eq!(parsed.matching, settings.matching);
}
