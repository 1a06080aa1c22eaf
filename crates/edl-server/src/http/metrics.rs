use async_trait::async_trait;
use edl_core::{CacheSnapshot, EdlError, RefreshObserver};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use std::time::Duration;

// ── Label types ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabel {
    pub route: String,
}

// ── Metrics registry ───────────────────────────────────────────────────────────

pub struct EdlMetrics {
    pub registry: Registry,

    // Refresh outcomes, fed by the service after each rebuild
    pub refreshes: Counter,
    pub refresh_failures: Counter,
    pub refresh_duration: Histogram,

    // Current list
    pub indicators: Gauge,

    // HTTP requests by route
    pub requests: Family<RouteLabel, Counter>,

    // Uptime (set on each scrape)
    pub uptime_seconds: Gauge,
}

impl EdlMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let refreshes: Counter = Counter::default();
        registry.register(
            "edl_refreshes",
            "Successful EDL cache rebuilds",
            refreshes.clone(),
        );

        let refresh_failures: Counter = Counter::default();
        registry.register(
            "edl_refresh_failures",
            "EDL cache rebuilds that failed",
            refresh_failures.clone(),
        );

        let refresh_duration =
            Histogram::new([0.01_f64, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0].into_iter());
        registry.register(
            "edl_refresh_duration_seconds",
            "EDL cache rebuild duration in seconds",
            refresh_duration.clone(),
        );

        let indicators: Gauge = Gauge::default();
        registry.register(
            "edl_indicators",
            "Indicators in the current EDL",
            indicators.clone(),
        );

        let requests: Family<RouteLabel, Counter> = Family::default();
        registry.register(
            "edl_requests",
            "HTTP requests by route",
            requests.clone(),
        );

        let uptime_seconds: Gauge = Gauge::default();
        registry.register(
            "edl_uptime_seconds",
            "Server uptime in seconds",
            uptime_seconds.clone(),
        );

        Self {
            registry,
            refreshes,
            refresh_failures,
            refresh_duration,
            indicators,
            requests,
            uptime_seconds,
        }
    }

    pub fn record_request(&self, route: &str) {
        self.requests
            .get_or_create(&RouteLabel {
                route: route.to_string(),
            })
            .inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for EdlMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefreshObserver for EdlMetrics {
    async fn refreshed(&self, snapshot: &CacheSnapshot, elapsed: Duration) {
        self.refreshes.inc();
        self.refresh_duration.observe(elapsed.as_secs_f64());
        self.indicators.set(snapshot.indicator_count as i64);
    }

    async fn refresh_failed(&self, _error: &EdlError, elapsed: Duration) {
        self.refresh_failures.inc();
        self.refresh_duration.observe(elapsed.as_secs_f64());
    }
}
