mod memory;
mod query;
mod traits;

pub use memory::MemoryIndicatorSource;
pub use query::{IndicatorQuery, QueryTerm};
pub use traits::IndicatorSource;
