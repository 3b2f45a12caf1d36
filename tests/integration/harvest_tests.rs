//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the upstream JSON service and
//! run full harvests against temporary URL lists and dump directories.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use sumi_harvest::config::{Config, HarvestConfig, OutputMode};
use sumi_harvest::harvest::{run_all, run_locale, Coordinator, Fetcher, LocaleOutcome};
use sumi_harvest::output::{open_sink, read_array};
use sumi_harvest::{identity_from_record, DedupIndex, HarvestError};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration rooted in `dir` with fast retries
fn create_test_config(dir: &Path, locales: &[&str]) -> Config {
    let mut config = Config::default();
    config.locales = locales.iter().map(|l| l.to_string()).collect();
    config.harvest = HarvestConfig {
        concurrency: 3,
        retries: 2,
        timeout_ms: 2_000,
        backoff_base_ms: 10,
        jitter_min_ms: 0,
        jitter_max_ms: 5,
        ..HarvestConfig::default()
    };
    config.output.urls_dir = dir.join("urls");
    config.output.dumps_dir = dir.join("dumps");
    std::fs::create_dir_all(&config.output.urls_dir).expect("Failed to create urls dir");
    config
}

/// Writes `<urls-dir>/<locale>.txt` for the given property ids
fn write_url_list(config: &Config, locale: &str, base_url: &str, ids: &[&str]) {
    let lines: Vec<String> = ids
        .iter()
        .map(|id| property_url(base_url, id, locale))
        .collect();
    std::fs::write(config.output.url_list_path(locale), lines.join("\n"))
        .expect("Failed to write url list");
}

fn property_url(base_url: &str, id: &str, locale: &str) -> String {
    format!(
        "{}/bear/property_info?property={}&language={}&arrival=2026-01-01&los=1&filters=rate",
        base_url, id, locale
    )
}

fn property_record(id: &str) -> Value {
    json!({
        "query": { "property": [id], "language": ["en"] },
        "response": { id: { "name": format!("Hotel {}", id), "rooms": 12 } }
    })
}

async fn mount_property(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path("/bear/property_info"))
        .and(query_param("property", id))
        .respond_with(ResponseTemplate::new(200).set_body_json(property_record(id)))
        .mount(server)
        .await;
}

/// Reads every line of an NDJSON dump as JSON
fn read_dump(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("Failed to read dump")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("Dump line is not valid JSON"))
        .collect()
}

/// Counts records per identity
fn identity_counts(records: &[Value]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for record in records {
        let id = identity_from_record(record).expect("Record without identity");
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}

fn completed(outcome: &LocaleOutcome) -> &sumi_harvest::RunSummary {
    match outcome {
        LocaleOutcome::Completed(summary) => summary,
        other => panic!("expected a completed run, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_harvest_single_locale() {
    let server = MockServer::start().await;
    for id in ["1", "2", "3", "4", "5"] {
        mount_property(&server, id).await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en"]);
    write_url_list(&config, "en", &server.uri(), &["1", "2", "3", "4", "5"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    assert_eq!(reports.len(), 1);

    let summary = completed(&reports[0].outcome);
    assert_eq!(summary.totals.scheduled, 5);
    assert_eq!(summary.totals.succeeded, 5);
    assert_eq!(summary.totals.failed, 0);

    // Output order follows completion order, so compare as a set
    let records = read_dump(&config.output.dump_path("en"));
    let counts = identity_counts(&records);
    assert_eq!(counts.len(), 5);
    assert!(counts.values().all(|&n| n == 1));
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    mount_property(&server, "1").await;
    mount_property(&server, "2").await;

    // Property 3 fails on the first run and recovers on the second
    Mock::given(method("GET"))
        .and(query_param("property", "3"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_property(&server, "3").await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en"]);
    write_url_list(&config, "en", &server.uri(), &["1", "2", "3"]);

    let first = run_all(&config).await.expect("First run failed");
    let first = completed(&first[0].outcome);
    assert_eq!(first.totals.succeeded, 2);
    assert_eq!(first.totals.failed, 1);

    let second = run_all(&config).await.expect("Second run failed");
    let second_summary = completed(&second[0].outcome);
    // Only the previously failed property is fetched again
    assert_eq!(second[0].seeded, 2);
    assert_eq!(second_summary.totals.scheduled, 1);
    assert_eq!(second_summary.totals.succeeded, 1);

    let third = run_all(&config).await.expect("Third run failed");
    assert!(matches!(third[0].outcome, LocaleOutcome::NothingToDo));

    let counts = identity_counts(&read_dump(&config.output.dump_path("en")));
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|&n| n == 1));
}

#[tokio::test]
async fn test_preseeded_identity_is_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("property", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(property_record("42")))
        .expect(0)
        .mount(&server)
        .await;
    mount_property(&server, "43").await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en"]);
    std::fs::create_dir_all(&config.output.dumps_dir).unwrap();
    std::fs::write(
        config.output.dump_path("en"),
        "{\"query\":{\"property\":[\"42\"]},\"response\":{\"42\":{\"name\":\"Seeded\"}}}\n",
    )
    .unwrap();
    write_url_list(&config, "en", &server.uri(), &["42", "43"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    let summary = completed(&reports[0].outcome);
    assert_eq!(summary.totals.scheduled, 1);
    assert_eq!(summary.totals.succeeded, 1);

    let records = read_dump(&config.output.dump_path("en"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["response"]["42"]["name"], "Seeded");
}

#[tokio::test]
async fn test_same_identity_from_two_urls_written_once() {
    let server = MockServer::start().await;
    // Both requests resolve to the same resource server-side
    Mock::given(method("GET"))
        .and(path("/bear/property_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(property_record("7")))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en"]);
    write_url_list(&config, "en", &server.uri(), &["7", "old-7"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    let summary = completed(&reports[0].outcome);

    assert_eq!(summary.totals.attempted, 2);
    assert_eq!(summary.totals.succeeded, 1);
    assert_eq!(summary.totals.duplicates, 1);
    assert_eq!(summary.totals.failed, 0);

    let records = read_dump(&config.output.dump_path("en"));
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_failures_do_not_stop_the_pool() {
    let server = MockServer::start().await;
    mount_property(&server, "1").await;
    mount_property(&server, "3").await;
    Mock::given(method("GET"))
        .and(query_param("property", "2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("property", "4"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en"]);
    write_url_list(&config, "en", &server.uri(), &["1", "2", "3", "4"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    let summary = completed(&reports[0].outcome);

    assert_eq!(summary.totals.succeeded, 2);
    assert_eq!(summary.totals.failed, 2);

    let counts = identity_counts(&read_dump(&config.output.dump_path("en")));
    assert!(counts.contains_key("1"));
    assert!(counts.contains_key("3"));
    assert!(!counts.contains_key("2"));
    assert!(!counts.contains_key("4"));
}

#[tokio::test]
async fn test_corrupt_trailing_line_does_not_abort() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("property", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(property_record("1")))
        .expect(0)
        .mount(&server)
        .await;
    mount_property(&server, "2").await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en"]);
    std::fs::create_dir_all(&config.output.dumps_dir).unwrap();
    let dump = config.output.dump_path("en");
    std::fs::write(
        &dump,
        "{\"query\":{\"property\":[\"1\"]},\"response\":{\"1\":{}}}\n{\"query\":{\"proper",
    )
    .unwrap();
    write_url_list(&config, "en", &server.uri(), &["1", "2"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    assert_eq!(reports[0].seeded, 1);
    assert_eq!(completed(&reports[0].outcome).totals.succeeded, 1);

    // The torn line stays unreadable, the new record stays parseable
    let lines: Vec<String> = std::fs::read_to_string(&dump)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(serde_json::from_str::<Value>(&lines[1]).is_err());
    let appended: Value = serde_json::from_str(&lines[2]).unwrap();
    assert_eq!(identity_from_record(&appended), Some("2".to_string()));
}

#[tokio::test]
async fn test_start_and_limit_slice_the_list() {
    let server = MockServer::start().await;
    for id in ["1", "4"] {
        Mock::given(method("GET"))
            .and(query_param("property", id))
            .respond_with(ResponseTemplate::new(200).set_body_json(property_record(id)))
            .expect(0)
            .mount(&server)
            .await;
    }
    mount_property(&server, "2").await;
    mount_property(&server, "3").await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), &["en"]);
    config.harvest.start = 1;
    config.harvest.limit = 2;
    write_url_list(&config, "en", &server.uri(), &["1", "2", "3", "4"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    assert_eq!(completed(&reports[0].outcome).totals.succeeded, 2);

    let counts = identity_counts(&read_dump(&config.output.dump_path("en")));
    let mut ids: Vec<_> = counts.keys().cloned().collect();
    ids.sort();
    assert_eq!(ids, vec!["2", "3"]);
}

#[tokio::test]
async fn test_missing_url_list_skips_locale() {
    let server = MockServer::start().await;
    mount_property(&server, "1").await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["fr", "en"]);
    write_url_list(&config, "en", &server.uri(), &["1"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0].outcome, LocaleOutcome::MissingInput));
    assert_eq!(completed(&reports[1].outcome).totals.succeeded, 1);
    assert!(!config.output.dump_path("fr").exists());
}

#[tokio::test]
async fn test_unwritable_dumps_dir_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), &["en"]);
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    config.output.dumps_dir = blocker.join("dumps");

    let result = run_all(&config).await;
    assert!(matches!(result, Err(HarvestError::Setup { .. })));
}

#[tokio::test]
async fn test_batch_mode_merges_array() {
    let server = MockServer::start().await;
    mount_property(&server, "2").await;
    mount_property(&server, "3").await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), &["en"]);
    config.output.mode = OutputMode::JsonArray;
    std::fs::create_dir_all(&config.output.dumps_dir).unwrap();
    let dump = config.output.dump_path("en");
    assert!(dump.to_string_lossy().ends_with("en.json"));
    std::fs::write(&dump, serde_json::to_string(&vec![property_record("1")]).unwrap()).unwrap();
    write_url_list(&config, "en", &server.uri(), &["1", "2", "3"]);

    let reports = run_all(&config).await.expect("Harvest failed");
    assert_eq!(reports[0].seeded, 1);
    assert_eq!(completed(&reports[0].outcome).totals.succeeded, 2);

    let records = read_array(&dump).unwrap();
    let counts = identity_counts(&records);
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|&n| n == 1));
}

#[tokio::test]
async fn test_attempts_bounded_across_pool() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        // 4 URLs * (1 + 2 retries)
        .expect(12)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en"]);
    std::fs::create_dir_all(&config.output.dumps_dir).unwrap();

    let fetcher = Fetcher::from_config(&config).unwrap();
    let sink = open_sink(config.output.mode, &config.output.dump_path("en")).unwrap();
    let coordinator = Coordinator::new(
        &config.harvest,
        fetcher,
        Arc::new(DedupIndex::new()),
        sink,
    );

    let urls: Vec<String> = ["1", "2", "3", "4"]
        .iter()
        .map(|id| property_url(&server.uri(), id, "en"))
        .collect();
    let plan = coordinator.plan(&urls, &config.harvest);
    let summary = coordinator.run(plan.items).await.unwrap();

    assert_eq!(summary.totals.failed, 4);
    assert_eq!(summary.totals.attempted, 4);
}

#[tokio::test]
async fn test_run_locale_reuses_fetcher() {
    let server = MockServer::start().await;
    mount_property(&server, "1").await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), &["en", "de"]);
    std::fs::create_dir_all(&config.output.dumps_dir).unwrap();
    write_url_list(&config, "en", &server.uri(), &["1"]);
    write_url_list(&config, "de", &server.uri(), &["1"]);

    let fetcher = Fetcher::from_config(&config).unwrap();
    for locale in ["en", "de"] {
        let report = run_locale(&config, &fetcher, locale).await.unwrap();
        assert_eq!(completed(&report.outcome).totals.succeeded, 1);
    }

    // Locales are deduplicated independently
    assert_eq!(read_dump(&config.output.dump_path("en")).len(), 1);
    assert_eq!(read_dump(&config.output.dump_path("de")).len(), 1);
}
