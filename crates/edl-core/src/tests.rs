use crate::*;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Memory store that counts page requests and can be told to fail or stall.
struct CountingSource {
    inner: MemoryIndicatorSource,
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl CountingSource {
    fn with_ips(n: usize) -> Self {
        let iocs = (0..n)
            .map(|i| {
                Indicator::new(format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256))
                    .with_attribute("indicator_type", "IP")
            })
            .collect();
        Self {
            inner: MemoryIndicatorSource::new(iocs),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndicatorSource for CountingSource {
    async fn find_indicators(&self, query: &str, page: usize, size: usize) -> Result<IndicatorPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(EdlError::Fetch("indicator store unavailable".into()));
        }
        self.inner.find_indicators(query, page, size).await
    }
}

#[derive(Default)]
struct RecordingObserver {
    refreshed: Mutex<Vec<usize>>,
    failed: AtomicUsize,
}

#[async_trait]
impl RefreshObserver for RecordingObserver {
    async fn refreshed(&self, snapshot: &CacheSnapshot, _elapsed: Duration) {
        self.refreshed.lock().unwrap().push(snapshot.indicator_count);
    }

    async fn refresh_failed(&self, _error: &EdlError, _elapsed: Duration) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, minute, 0).unwrap()
}

fn service(source: &Arc<CountingSource>, settings: EdlSettings) -> EdlService {
    let _ = env_logger::builder().is_test(true).try_init();
    EdlService::new(source.clone() as Arc<dyn IndicatorSource>, settings)
}

fn five_minutes() -> RefreshRate {
    "5 minutes".parse().unwrap()
}

// ── Paging ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_250_indicators_takes_two_pages() {
    let source = CountingSource::with_ips(250);
    let iocs = fetch_indicators(&source, "type:IP", None).await.unwrap();
    assert_eq!(iocs.len(), 250);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_fetch_exact_multiple_asks_for_an_empty_page() {
    let source = CountingSource::with_ips(400);
    let iocs = fetch_indicators(&source, "type:IP", None).await.unwrap();
    assert_eq!(iocs.len(), 400);
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_fetch_stops_at_limit() {
    let source = CountingSource::with_ips(1000);
    let iocs = fetch_indicators(&source, "type:IP", Some(150)).await.unwrap();
    assert_eq!(iocs.len(), 150);
    assert_eq!(source.calls(), 1);

    let source = CountingSource::with_ips(1000);
    let iocs = fetch_indicators(&source, "type:IP", Some(210)).await.unwrap();
    assert_eq!(iocs.len(), 210);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_refresh_populates_250_entries() {
    let source = Arc::new(CountingSource::with_ips(250));
    let svc = service(&source, EdlSettings::new("type:IP", OutputFormat::Text));

    let snapshot = svc.refresh_at("type:IP", OutputFormat::Text, at(0)).await.unwrap();
    assert_eq!(snapshot.len(), 250);
    assert_eq!(snapshot.refreshed_at, Some(at(0)));
    assert_eq!(source.calls(), 2);
}

// ── Staleness ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_serve_builds_the_cache() {
    let source = Arc::new(CountingSource::with_ips(10));
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_refresh_rate(five_minutes()),
    );

    let snapshot = svc.serve_at(at(0)).await.unwrap();
    assert_eq!(snapshot.len(), 10);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_fresh_cache_served_without_refetch() {
    let source = Arc::new(CountingSource::with_ips(10));
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_refresh_rate(five_minutes()),
    );

    let first = svc.serve_at(at(0)).await.unwrap();
    let second = svc.serve_at(at(4)).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.render(), second.render());
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_stale_cache_triggers_exactly_one_refresh() {
    let source = Arc::new(CountingSource::with_ips(10));
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_refresh_rate(five_minutes()),
    );

    svc.serve_at(at(0)).await.unwrap();
    source.inner.insert(Indicator::new("10.9.9.9").with_attribute("indicator_type", "IP")).unwrap();

    let refreshed = svc.serve_at(at(6)).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(refreshed.len(), 11);
    assert_eq!(refreshed.refreshed_at, Some(at(6)));

    // Still fresh relative to the new stamp.
    svc.serve_at(at(7)).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stale_requests_share_one_refresh() {
    let source = Arc::new(CountingSource::with_ips(10).with_delay(Duration::from_millis(50)));
    let svc = Arc::new(service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_refresh_rate(five_minutes()),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.serve_at(at(0)).await })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    for result in results {
        let snapshot = result.unwrap().unwrap();
        assert_eq!(snapshot.len(), 10);
    }
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let source = Arc::new(CountingSource::with_ips(10));
    let observer = Arc::new(RecordingObserver::default());
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_refresh_rate(five_minutes()),
    )
    .with_observer(observer.clone());

    let before = svc.serve_at(at(0)).await.unwrap();
    source.fail.store(true, Ordering::SeqCst);

    let err = svc.serve_at(at(10)).await.unwrap_err();
    assert!(matches!(err, EdlError::Fetch(_)));
    assert!(Arc::ptr_eq(&before, &svc.snapshot()));
    assert_eq!(*observer.refreshed.lock().unwrap(), vec![10]);
    assert_eq!(observer.failed.load(Ordering::SeqCst), 1);

    // Recovery on the next request.
    source.fail.store(false, Ordering::SeqCst);
    let after = svc.serve_at(at(11)).await.unwrap();
    assert_eq!(after.refreshed_at, Some(at(11)));
}

#[tokio::test]
async fn test_malformed_query_is_fatal_and_not_retried() {
    let source = Arc::new(CountingSource::with_ips(10));
    let svc = service(&source, EdlSettings::new("type", OutputFormat::Text));

    let err = svc.serve_at(at(0)).await.unwrap_err();
    assert!(matches!(err, EdlError::Fetch(_)));
    assert_eq!(source.calls(), 1);
    assert!(svc.snapshot().refreshed_at.is_none());
}

// ── On-demand mode ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_on_demand_never_expires() {
    let source = Arc::new(CountingSource::with_ips(10));
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text)
            .with_on_demand(true)
            .with_refresh_rate(five_minutes()),
    );

    let empty = svc.serve_at(at(0)).await.unwrap();
    assert!(empty.is_empty());
    assert_eq!(source.calls(), 0);

    let updated = svc.update_on_demand("type:IP", OutputFormat::Csv).await.unwrap();
    assert_eq!(updated.format, OutputFormat::Csv);
    assert_eq!(source.calls(), 1);

    let served = svc.serve_at(Utc::now() + chrono::Duration::days(365)).await.unwrap();
    assert!(Arc::ptr_eq(&updated, &served));
    assert_eq!(served.values()[0], "value,indicator_type");
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_update_rejected_when_on_demand_off() {
    let source = Arc::new(CountingSource::with_ips(10));
    let svc = service(&source, EdlSettings::new("type:IP", OutputFormat::Text));

    let err = svc.update_on_demand("type:IP", OutputFormat::Text).await.unwrap_err();
    assert!(matches!(err, EdlError::OnDemandDisabled));
    assert!(err.to_string().contains("Update EDL On Demand"));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_restored_snapshot_is_served() {
    let source = Arc::new(CountingSource::with_ips(3));
    let saved = CacheSnapshot::build(
        OutputFormat::Text,
        &[Indicator::new("saved.example.com")],
        at(0),
    )
    .unwrap();
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_refresh_rate(five_minutes()),
    )
    .with_snapshot(saved);

    assert_eq!(svc.serve_at(at(1)).await.unwrap().render(), "saved.example.com");
    assert_eq!(source.calls(), 0);
}

// ── Formats and grouping through the service ─────────────────────────────────

#[tokio::test]
async fn test_json_refresh_yields_array_of_all_indicators() {
    let source = Arc::new(CountingSource::with_ips(250));
    let svc = service(&source, EdlSettings::new("type:IP", OutputFormat::Json));

    let snapshot = svc.serve_at(at(0)).await.unwrap();
    assert_eq!(snapshot.content_type(), "application/json");
    let body: serde_json::Value = serde_json::from_str(&snapshot.render()).unwrap();
    assert_eq!(body.as_array().map(Vec::len), Some(250));
}

#[tokio::test]
async fn test_ip_grouping_collapses_ranges() {
    let source = Arc::new(CountingSource::with_ips(300));
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_ip_grouping(true),
    );

    let snapshot = svc.serve_at(at(0)).await.unwrap();
    assert_eq!(snapshot.render(), "10.0.0.0-10.0.1.43");
}

#[tokio::test]
async fn test_limit_applies_to_service_refresh() {
    let source = Arc::new(CountingSource::with_ips(500));
    let svc = service(
        &source,
        EdlSettings::new("type:IP", OutputFormat::Text).with_limit(Some(25)),
    );

    assert_eq!(svc.serve_at(at(0)).await.unwrap().len(), 25);
}
