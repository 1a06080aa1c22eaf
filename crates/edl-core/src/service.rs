use crate::cache::{CacheSnapshot, EdlCache};
use crate::error::{EdlError, Result};
use crate::format::OutputFormat;
use crate::grouping::group_ips;
use crate::refresh_rate::RefreshRate;
use crate::source::IndicatorSource;
use crate::types::Indicator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Indicators requested per page from the indicator source.
pub const PAGE_SIZE: usize = 200;

/// What the EDL serves and how long a built list stays valid.
#[derive(Debug, Clone)]
pub struct EdlSettings {
    /// Filter expression passed to the indicator source.
    pub query: String,
    pub format: OutputFormat,
    /// Never expire the cache on its own; only manual updates rebuild it.
    pub on_demand: bool,
    pub refresh_rate: RefreshRate,
    /// Upper bound on indicators per list. `None` = everything that matches.
    pub limit: Option<usize>,
    /// Collapse consecutive IPv4 addresses into ranges.
    pub ip_grouping: bool,
}

impl EdlSettings {
    pub fn new(query: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            query: query.into(),
            format,
            on_demand: false,
            refresh_rate: RefreshRate::default(),
            limit: None,
            ip_grouping: false,
        }
    }

    pub fn with_refresh_rate(mut self, rate: RefreshRate) -> Self {
        self.refresh_rate = rate;
        self
    }

    pub fn with_on_demand(mut self, on_demand: bool) -> Self {
        self.on_demand = on_demand;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_ip_grouping(mut self, ip_grouping: bool) -> Self {
        self.ip_grouping = ip_grouping;
        self
    }
}

/// Gets told about every rebuild (metrics, persistence). Observers run
/// while the refresh guard is held, before the new snapshot is swapped in.
#[async_trait]
pub trait RefreshObserver: Send + Sync {
    async fn refreshed(&self, snapshot: &CacheSnapshot, elapsed: Duration);

    async fn refresh_failed(&self, _error: &EdlError, _elapsed: Duration) {}
}

/// Pull every indicator matching `query`, page by page, up to `limit`.
///
/// Keeps asking for the next page while the previous one came back full and
/// the limit has not been reached. Errors from the source are returned as-is;
/// nothing is retried.
pub async fn fetch_indicators(
    source: &dyn IndicatorSource,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<Indicator>> {
    let mut iocs = Vec::new();
    let mut page = 0;

    loop {
        let fetched = source.find_indicators(query, page, PAGE_SIZE).await?.iocs;
        let full_page = fetched.len() == PAGE_SIZE;
        iocs.extend(fetched);

        let under_limit = limit.map_or(true, |l| iocs.len() < l);
        if !full_page || !under_limit {
            break;
        }
        page += 1;
    }

    if let Some(limit) = limit {
        iocs.truncate(limit);
    }
    Ok(iocs)
}

/// The EDL itself: an indicator source, the settings, and the cached list.
pub struct EdlService {
    source: Arc<dyn IndicatorSource>,
    settings: EdlSettings,
    cache: EdlCache,
    observers: Vec<Arc<dyn RefreshObserver>>,
}

impl EdlService {
    pub fn new(source: Arc<dyn IndicatorSource>, settings: EdlSettings) -> Self {
        let cache = EdlCache::new(settings.format);
        Self {
            source,
            settings,
            cache,
            observers: Vec::new(),
        }
    }

    /// Start from a previously built snapshot instead of an empty cache.
    pub fn with_snapshot(mut self, snapshot: CacheSnapshot) -> Self {
        self.cache = EdlCache::with_snapshot(snapshot);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RefreshObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn settings(&self) -> &EdlSettings {
        &self.settings
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The current snapshot, stale or not.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.cache.snapshot()
    }

    /// The list to serve right now.
    pub async fn serve(&self) -> Result<Arc<CacheSnapshot>> {
        self.serve_at(Utc::now()).await
    }

    /// The list to serve at `now`.
    ///
    /// In on-demand mode the current snapshot is returned untouched.
    /// Otherwise a snapshot older than the refresh rate is rebuilt before
    /// returning. Concurrent callers that find it stale wait for a single
    /// rebuild and share its result.
    pub async fn serve_at(&self, now: DateTime<Utc>) -> Result<Arc<CacheSnapshot>> {
        if self.settings.on_demand {
            return Ok(self.cache.snapshot());
        }

        let rate = &self.settings.refresh_rate;
        let current = self.cache.snapshot();
        if !current.is_stale(rate, now) {
            log::debug!("Serving cached EDL ({} entries)", current.len());
            return Ok(current);
        }

        let _guard = self.cache.lock_refresh().await;
        let current = self.cache.snapshot();
        if !current.is_stale(rate, now) {
            log::debug!("EDL refreshed by a concurrent request");
            return Ok(current);
        }

        log::debug!(
            "EDL cache stale (last refresh: {:?}, rate: {}), rebuilding",
            current.refreshed_at,
            rate
        );
        self.rebuild(&self.settings.query, self.settings.format, now)
            .await
    }

    /// Rebuild the list from `query` in `format`, regardless of age.
    pub async fn refresh(&self, query: &str, format: OutputFormat) -> Result<Arc<CacheSnapshot>> {
        self.refresh_at(query, format, Utc::now()).await
    }

    pub async fn refresh_at(
        &self,
        query: &str,
        format: OutputFormat,
        now: DateTime<Utc>,
    ) -> Result<Arc<CacheSnapshot>> {
        let _guard = self.cache.lock_refresh().await;
        self.rebuild(query, format, now).await
    }

    /// Manual update. Only allowed in on-demand mode.
    pub async fn update_on_demand(&self, query: &str, format: OutputFormat) -> Result<Arc<CacheSnapshot>> {
        if !self.settings.on_demand {
            return Err(EdlError::OnDemandDisabled);
        }
        self.refresh(query, format).await
    }

    async fn rebuild(
        &self,
        query: &str,
        format: OutputFormat,
        now: DateTime<Utc>,
    ) -> Result<Arc<CacheSnapshot>> {
        let started = Instant::now();
        match self.build_snapshot(query, format, now).await {
            Ok(snapshot) => {
                let elapsed = started.elapsed();
                log::info!(
                    "EDL refreshed from {}: query={:?} format={} indicators={} in {:?}",
                    self.source.name(),
                    query,
                    format,
                    snapshot.indicator_count,
                    elapsed
                );
                for observer in &self.observers {
                    observer.refreshed(&snapshot, elapsed).await;
                }
                Ok(self.cache.replace(snapshot))
            }
            Err(e) => {
                let elapsed = started.elapsed();
                log::error!("EDL refresh failed for query {:?}: {}", query, e);
                for observer in &self.observers {
                    observer.refresh_failed(&e, elapsed).await;
                }
                Err(e)
            }
        }
    }

    async fn build_snapshot(
        &self,
        query: &str,
        format: OutputFormat,
        now: DateTime<Utc>,
    ) -> Result<CacheSnapshot> {
        let mut iocs = fetch_indicators(self.source.as_ref(), query, self.settings.limit).await?;
        if self.settings.ip_grouping {
            iocs = group_ips(iocs);
        }
        CacheSnapshot::build(format, &iocs, now)
    }
}
