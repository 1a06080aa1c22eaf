use crate::error::Result;
use crate::format::{self, OutputFormat, JSON_LIST_KEY};
use crate::refresh_rate::RefreshRate;
use crate::types::Indicator;
use chrono::{DateTime, Utc};
use futures::lock::{Mutex, MutexGuard};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// One fully built EDL: every fragment the endpoint serves, in order.
///
/// Snapshots are immutable. A refresh builds a new one and swaps it in, so
/// a reader sees either the old list or the new one, never a mix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSnapshot {
    pub format: OutputFormat,

    /// CSV header line. Only set for [`OutputFormat::Csv`] with at least one indicator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Indicator value → encoded fragment, in fetch order. The JSON format
    /// stores its single array under [`JSON_LIST_KEY`].
    pub entries: IndexMap<String, String>,

    /// Number of indicators the snapshot was built from.
    pub indicator_count: usize,

    /// When the snapshot was built. `None` until the first refresh.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl CacheSnapshot {
    /// An empty, never-refreshed snapshot.
    pub fn empty(format: OutputFormat) -> Self {
        Self {
            format,
            header: None,
            entries: IndexMap::new(),
            indicator_count: 0,
            refreshed_at: None,
        }
    }

    /// Encode `iocs` in `format`.
    pub fn build(format: OutputFormat, iocs: &[Indicator], refreshed_at: DateTime<Utc>) -> Result<Self> {
        let mut snapshot = Self::empty(format);
        snapshot.refreshed_at = Some(refreshed_at);

        let columns = iocs.first().map(Indicator::field_names).unwrap_or_default();
        let encode: Box<dyn Fn(&Indicator) -> Result<String> + '_> = match format {
            OutputFormat::Json => {
                snapshot
                    .entries
                    .insert(JSON_LIST_KEY.to_string(), format::json_list(iocs)?);
                snapshot.indicator_count = iocs.len();
                return Ok(snapshot);
            }
            OutputFormat::Text => Box::new(|ioc: &Indicator| Ok(format::text_fragment(ioc))),
            OutputFormat::JsonSeq => Box::new(format::json_seq_fragment),
            OutputFormat::Csv => Box::new(|ioc: &Indicator| format::csv_row(ioc, &columns)),
        };

        for ioc in iocs.iter().filter(|ioc| !ioc.value().is_empty()) {
            snapshot.entries.insert(ioc.value().to_string(), encode(ioc)?);
        }

        if format == OutputFormat::Csv {
            if let Some(first) = iocs.first() {
                snapshot.header = Some(format::csv_header(first)?);
            }
        }

        snapshot.indicator_count = snapshot.entries.len();
        Ok(snapshot)
    }

    /// Served fragments in order; the CSV header comes first.
    pub fn values(&self) -> Vec<&str> {
        self.header
            .as_deref()
            .into_iter()
            .chain(self.entries.values().map(String::as_str))
            .collect()
    }

    /// The response body: every fragment, newline-joined.
    pub fn render(&self) -> String {
        self.values().join("\n")
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the snapshot was never built or is at least `rate` old at `now`.
    pub fn is_stale(&self, rate: &RefreshRate, now: DateTime<Utc>) -> bool {
        match self.refreshed_at {
            None => true,
            Some(at) => now - at >= rate.as_chrono(),
        }
    }
}

/// Holder of the current [`CacheSnapshot`] plus the guard that keeps
/// refreshes single-flight.
#[derive(Debug)]
pub struct EdlCache {
    current: RwLock<Arc<CacheSnapshot>>,
    refresh_guard: Mutex<()>,
}

impl EdlCache {
    pub fn new(format: OutputFormat) -> Self {
        Self::with_snapshot(CacheSnapshot::empty(format))
    }

    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            refresh_guard: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `snapshot` and return it.
    pub fn replace(&self, snapshot: CacheSnapshot) -> Arc<CacheSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }

    /// Wait for exclusive rights to rebuild. Callers must re-check staleness
    /// after acquiring; someone else may have refreshed in the meantime.
    pub async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_guard.lock().await
    }
}
