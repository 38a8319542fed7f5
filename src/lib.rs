//! Regime Monitor
//!
//! Per-symbol market regime classification (TREND / RANGE / TRANSITION) with
//! hysteresis, plus ATR-based volatility bucketing. Indicator values come from
//! an upstream technical-analysis source; the regime feeds a downstream
//! decision layer.

pub mod config;
pub mod data;
pub mod regime;
pub mod replay;
pub mod types;
pub mod volatility;

pub use config::Config;
pub use regime::{ClassifyOptions, RegimeClassifier, RegimeOutcome};
pub use types::*;
pub use volatility::VolatilityClassifier;
