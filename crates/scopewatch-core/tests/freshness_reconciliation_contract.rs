//! Contract Test: Freshness Reconciliation
//!
//! This test verifies the enumerate → probe → compare cycle.
//!
//! Constraints verified:
//! - Every root domain is enumerated, the union is probed in one batch
//! - A failing or slow enumerator costs only its own domain
//! - First run seeds the baseline silently
//! - Each changed field is reported on its own
//! - Probe failure aborts the cycle and keeps the previous snapshot
//! - An unreadable snapshot is replaced without diffing; an empty one is fatal
//! - No root domains is a configuration error

mod common;

use common::*;
use scopewatch_core::engine::{CycleOutcome, EventSink, FreshnessWatcher, Pipeline, PipelineEvent};
use scopewatch_core::error::Error;
use scopewatch_core::model::{ChangeEvent, ProbeRecord};
use scopewatch_core::state::{FileSnapshotStore, MemorySnapshotStore};
use scopewatch_core::WatchConfig;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn config_for(domains: &[&str]) -> WatchConfig {
    let mut config = test_config();
    config.freshness.domains = domains.iter().map(|d| d.to_string()).collect();
    config
}

fn watcher(
    enumerator: &MapEnumerator,
    prober: &RecordingProber,
    store: &MemorySnapshotStore<Vec<ProbeRecord>>,
    notifier: &RecordingNotifier,
    config: &WatchConfig,
) -> FreshnessWatcher {
    FreshnessWatcher::new(
        Arc::new(enumerator.clone()),
        Arc::new(prober.clone()),
        Arc::new(store.clone()),
        dispatcher(notifier, config),
        config,
    )
}

fn kinds(events: &[ChangeEvent]) -> BTreeSet<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

#[tokio::test]
async fn union_of_domains_is_probed_once() {
    let enumerator = MapEnumerator::new()
        .with("acme.com", &["api.acme.com", " www.acme.com ", ""])
        .with("acme.io", &["cdn.acme.io"]);
    let prober = RecordingProber::new();
    let store = MemorySnapshotStore::new();
    let notifier = RecordingNotifier::new();
    let config = config_for(&["acme.com", "acme.io"]);

    let report = watcher(&enumerator, &prober, &store, &notifier, &config)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(enumerator.call_count(), 2);
    let batches = prober.batches();
    assert_eq!(batches.len(), 1);

    let probed: BTreeSet<_> = batches[0].iter().map(String::as_str).collect();
    assert_eq!(
        probed,
        BTreeSet::from(["api.acme.com", "www.acme.com", "cdn.acme.io"])
    );

    // Unreachable hosts are still recorded, as dead services
    assert_eq!(report.outcome, CycleOutcome::Bootstrapped);
    assert_eq!(report.records, 3);
    let snapshot = store.current().await.unwrap();
    assert!(snapshot.iter().all(|r| !r.is_live));
    assert!(notifier.events().is_empty());
}

#[tokio::test]
async fn duplicate_hostnames_follow_dedupe_setting() {
    let enumerator = MapEnumerator::new()
        .with("acme.com", &["shared.acme.com", "a.acme.com"])
        .with("acme.net", &["shared.acme.com"]);
    let notifier = RecordingNotifier::new();

    let prober = RecordingProber::new();
    let config = config_for(&["acme.com", "acme.net"]);
    watcher(&enumerator, &prober, &MemorySnapshotStore::new(), &notifier, &config)
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(prober.batches()[0].len(), 2);

    let prober = RecordingProber::new();
    let mut config = config_for(&["acme.com", "acme.net"]);
    config.freshness.dedupe_hostnames = false;
    watcher(&enumerator, &prober, &MemorySnapshotStore::new(), &notifier, &config)
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(prober.batches()[0].len(), 3);
}

#[tokio::test]
async fn failing_enumerator_only_loses_its_domain() {
    // "broken.com" is unknown to the map and fails
    let enumerator = MapEnumerator::new().with("acme.com", &["api.acme.com"]);
    let prober = RecordingProber::new();
    let notifier = RecordingNotifier::new();
    let config = config_for(&["acme.com", "broken.com"]);

    watcher(&enumerator, &prober, &MemorySnapshotStore::new(), &notifier, &config)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(prober.batches(), vec![vec!["api.acme.com".to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn slow_enumerator_times_out() {
    let enumerator = MapEnumerator::new()
        .with("acme.com", &["api.acme.com"])
        .with_delay(Duration::from_secs(30));
    let prober = RecordingProber::new();
    let notifier = RecordingNotifier::new();
    let mut config = config_for(&["acme.com"]);
    config.freshness.enumerate_timeout_secs = 5;

    let report = watcher(&enumerator, &prober, &MemorySnapshotStore::new(), &notifier, &config)
        .run_cycle()
        .await
        .unwrap();

    // Nothing enumerated, nothing probed, snapshot untouched
    assert_eq!(report.outcome, CycleOutcome::Skipped);
    assert!(prober.batches().is_empty());
}

#[tokio::test]
async fn field_changes_are_reported_independently() {
    let enumerator = MapEnumerator::new().with("acme.com", &["a.acme.com", "b.acme.com"]);
    let prober = RecordingProber::new();
    prober.live("a.acme.com", "Home", &["301", "200"], 100, &["Nginx"]);
    prober.live("b.acme.com", "Login", &["200"], 50, &["React"]);

    let store = MemorySnapshotStore::new();
    let notifier = RecordingNotifier::new();
    let config = config_for(&["acme.com"]);
    let watcher = watcher(&enumerator, &prober, &store, &notifier, &config);

    let first = watcher.run_cycle().await.unwrap();
    assert_eq!(first.outcome, CycleOutcome::Bootstrapped);

    // Unchanged data: idempotent
    let second = watcher.run_cycle().await.unwrap();
    assert_eq!(second.outcome, CycleOutcome::Compared);
    assert!(second.changes.is_empty());

    // a: reordered chain (no change), new title and word count
    // b: extra status code and technology
    prober.live("a.acme.com", "Maintenance", &["200", "301"], 12, &["Nginx"]);
    prober.live("b.acme.com", "Login", &["200", "404"], 50, &["React", "jQuery"]);
    let third = watcher.run_cycle().await.unwrap();

    let a: Vec<_> = third
        .changes
        .iter()
        .filter(|e| e.key() == "https://a.acme.com")
        .cloned()
        .collect();
    assert_eq!(a.len(), 2);
    assert_eq!(kinds(&a), BTreeSet::from(["title_changed", "word_count_changed"]));

    let b: Vec<_> = third
        .changes
        .iter()
        .filter(|e| e.key() == "https://b.acme.com")
        .cloned()
        .collect();
    assert_eq!(
        kinds(&b),
        BTreeSet::from(["status_code_changed", "technology_changed"])
    );

    assert_eq!(notifier.events().len(), 4);
}

#[tokio::test]
async fn new_and_dead_services_are_reported() {
    let enumerator = MapEnumerator::new().with("acme.com", &["a.acme.com"]);
    let prober = RecordingProber::new();
    prober.live("a.acme.com", "Home", &["200"], 100, &[]);

    let store = MemorySnapshotStore::new();
    let notifier = RecordingNotifier::new();
    let config = config_for(&["acme.com"]);
    let watcher = watcher(&enumerator, &prober, &store, &notifier, &config);
    watcher.run_cycle().await.unwrap();

    // A new host shows up; the old one stays up
    enumerator.answer("acme.com", &["a.acme.com", "new.acme.com"]);
    prober.live("new.acme.com", "Beta", &["200"], 10, &[]);
    let report = watcher.run_cycle().await.unwrap();
    assert_eq!(enumerator.call_count(), 2);
    assert_eq!(report.changes.len(), 1);
    assert!(matches!(
        &report.changes[0],
        ChangeEvent::NewLiveService { record } if record.url == "https://new.acme.com"
    ));

    // The old host goes down
    prober.down("a.acme.com");
    let report = watcher.run_cycle().await.unwrap();
    let a = kinds(&report.changes);
    assert!(a.contains("scope_status_changed"));
    assert!(a.contains("title_changed"));
    assert!(report
        .changes
        .iter()
        .all(|e| e.key() == "https://a.acme.com"));

    // The host disappears from enumeration entirely: removals are silent
    enumerator.answer("acme.com", &["new.acme.com"]);
    let report = watcher.run_cycle().await.unwrap();
    assert!(report.changes.is_empty());
}

#[tokio::test]
async fn probe_failure_keeps_previous_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Subs.json");

    let enumerator = MapEnumerator::new().with("acme.com", &["a.acme.com"]);
    let prober = RecordingProber::new();
    prober.live("a.acme.com", "Home", &["200"], 100, &[]);
    let notifier = RecordingNotifier::new();
    let config = config_for(&["acme.com"]);

    let watcher = FreshnessWatcher::new(
        Arc::new(enumerator),
        Arc::new(prober.clone()),
        Arc::new(FileSnapshotStore::<Vec<ProbeRecord>>::new(&path)),
        dispatcher(&notifier, &config),
        &config,
    );
    watcher.run_cycle().await.unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    prober.fail("httpx: executable not found");
    let err = watcher.run_cycle().await.unwrap_err();

    assert!(matches!(err, Error::Probe(_)));
    assert!(!err.is_fatal());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

fn file_watcher(
    path: &std::path::Path,
    prober: &RecordingProber,
    notifier: &RecordingNotifier,
    config: &WatchConfig,
) -> FreshnessWatcher {
    FreshnessWatcher::new(
        Arc::new(MapEnumerator::new().with("acme.com", &["a.acme.com", "b.acme.com"])),
        Arc::new(prober.clone()),
        Arc::new(FileSnapshotStore::<Vec<ProbeRecord>>::new(path)),
        dispatcher(notifier, config),
        config,
    )
}

#[tokio::test]
async fn corrupted_snapshot_is_recovered_without_diff() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Subs.json");
    std::fs::write(&path, r#"[{"url":"https://a.acme.com","title":"Ho"#).unwrap();

    let prober = RecordingProber::new();
    prober.live("a.acme.com", "Home", &["200"], 100, &["Nginx"]);
    prober.down("b.acme.com");
    let notifier = RecordingNotifier::new();
    let config = config_for(&["acme.com"]);
    let (sink, mut events) = EventSink::channel(16);

    let report = file_watcher(&path, &prober, &notifier, &config)
        .with_events(sink)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.outcome, CycleOutcome::Recovered);
    assert!(report.changes.is_empty());
    assert!(notifier.events().is_empty());

    let on_disk: Vec<ProbeRecord> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let urls: BTreeSet<_> = on_disk.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        BTreeSet::from(["https://a.acme.com", "https://b.acme.com"])
    );
    assert!(matches!(
        events.try_recv(),
        Ok(PipelineEvent::Recovered { ref pipeline, .. }) if pipeline == "freshness"
    ));
}

#[tokio::test]
async fn empty_snapshot_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Subs.json");
    std::fs::write(&path, "[]").unwrap();

    let prober = RecordingProber::new();
    prober.live("a.acme.com", "Home", &["200"], 100, &[]);
    let notifier = RecordingNotifier::new();
    let config = config_for(&["acme.com"]);

    let err = file_watcher(&path, &prober, &notifier, &config)
        .run_cycle()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptySnapshot(_)));
    assert!(err.is_fatal());
    assert!(notifier.events().is_empty());
    // The degenerate file is left for inspection
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
}

#[tokio::test]
async fn no_domains_is_a_config_error() {
    let notifier = RecordingNotifier::new();
    let config = config_for(&[]);

    let err = watcher(
        &MapEnumerator::new(),
        &RecordingProber::new(),
        &MemorySnapshotStore::new(),
        &notifier,
        &config,
    )
    .run_cycle()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
}
