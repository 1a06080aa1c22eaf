//! Engine behind an External Dynamic List (EDL) endpoint.
//!
//! An EDL is a URL that firewalls and proxies poll for a flat list of
//! indicators (IPs, domains, hashes) to allow or block. This crate owns the
//! moving parts: fetching indicators page by page from an [`IndicatorSource`],
//! encoding them in one of the [`OutputFormat`]s, and keeping the encoded
//! list in an [`EdlCache`] that is rebuilt when it goes stale.
//!
//! ```rust,no_run
//! use edl_core::{EdlService, EdlSettings, MemoryIndicatorSource, OutputFormat, RefreshRate};
//! use std::sync::Arc;
//!
//! # async fn demo() -> edl_core::Result<()> {
//! let source = Arc::new(MemoryIndicatorSource::from_file("indicators.json")?);
//! let settings = EdlSettings::new("type:IP", OutputFormat::Text)
//!     .with_refresh_rate("5 minutes".parse::<RefreshRate>()?);
//! let service = EdlService::new(source, settings);
//! let snapshot = service.serve().await?;
//! println!("{}", snapshot.render());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod format;
pub mod grouping;
pub mod refresh_rate;
pub mod service;
pub mod source;
pub mod types;

pub use cache::{CacheSnapshot, EdlCache};
pub use error::{EdlError, Result};
pub use format::{OutputFormat, JSON_LIST_KEY};
pub use refresh_rate::{RefreshRate, RefreshUnit};
pub use service::{fetch_indicators, EdlService, EdlSettings, RefreshObserver, PAGE_SIZE};
pub use source::{IndicatorQuery, IndicatorSource, MemoryIndicatorSource};
pub use types::{Indicator, IndicatorPage};

#[cfg(test)]
mod tests;
