use crate::error::{EdlError, Result};
use crate::source::query::IndicatorQuery;
use crate::source::traits::IndicatorSource;
use crate::types::{Indicator, IndicatorPage};
use async_trait::async_trait;
use std::path::Path;
use std::sync::RwLock;

/// In-process indicator store.
///
/// Holds indicators in insertion order and answers paged queries with the
/// [`IndicatorQuery`] language. Loadable from a JSON array or a JSON-lines
/// file, which makes it the store of choice for file-fed deployments and
/// for tests.
#[derive(Debug, Default)]
pub struct MemoryIndicatorSource {
    indicators: RwLock<Vec<Indicator>>,
}

impl MemoryIndicatorSource {
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self {
            indicators: RwLock::new(indicators),
        }
    }

    /// Load indicators from `path`. A file whose first non-blank character
    /// is `[` is read as a JSON array, anything else as JSON lines.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let indicators = parse_indicators(&content)?;
        log::info!(
            "Loaded {} indicators from {}",
            indicators.len(),
            path.display()
        );
        Ok(Self::new(indicators))
    }

    pub fn insert(&self, indicator: Indicator) -> Result<()> {
        self.write()?.push(indicator);
        Ok(())
    }

    /// Swap the whole store for `indicators`.
    pub fn replace_all(&self, indicators: Vec<Indicator>) -> Result<()> {
        *self.write()? = indicators;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.indicators.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Indicator>>> {
        self.indicators
            .write()
            .map_err(|_| EdlError::Fetch("indicator store lock poisoned".into()))
    }
}

#[async_trait]
impl IndicatorSource for MemoryIndicatorSource {
    async fn find_indicators(&self, query: &str, page: usize, size: usize) -> Result<IndicatorPage> {
        let query: IndicatorQuery = query.parse()?;
        let store = self
            .indicators
            .read()
            .map_err(|_| EdlError::Fetch("indicator store lock poisoned".into()))?;

        let matching: Vec<&Indicator> = store.iter().filter(|ioc| query.matches(ioc)).collect();
        let total = matching.len() as u64;
        let iocs = matching
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .cloned()
            .collect();

        Ok(IndicatorPage {
            iocs,
            total: Some(total),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn parse_indicators(content: &str) -> Result<Vec<Indicator>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str::<Indicator>(line).map_err(EdlError::from))
        .collect()
}
