//! Market regime detection
//!
//! Classifies each symbol as TREND, RANGE or TRANSITION from ADX and debounces
//! the result per symbol so the regime cannot flip more than once per
//! minimum-duration window.

pub mod cache;
pub mod classifier;
pub mod clock;

pub use cache::{CacheEntry, CacheSummary, RegimeCache, SymbolSummary};
pub use classifier::{ClassifyOptions, RegimeClassifier, RegimeMetadata, RegimeOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
