//! Core data types used across the regime classifier

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for indicator snapshots read from external sources
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("{field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
}

/// Trading pair symbol using Arc<str> for cheap cloning
///
/// Symbols key the regime cache and are cloned into every summary and replay
/// record, so clones stay O(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

/// Market regime emitted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    /// Directional market, ADX at or above the trend threshold
    Trend,
    /// Sideways market, ADX at or below the range threshold
    Range,
    /// Between the two thresholds
    Transition,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trend => "TREND",
            Regime::Range => "RANGE",
            Regime::Transition => "TRANSITION",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volatility bucket derived from ATR as a percentage of price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VolatilityBucket {
    Low,
    Medium,
    High,
    Extreme,
}

impl VolatilityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityBucket::Low => "LOW",
            VolatilityBucket::Medium => "MEDIUM",
            VolatilityBucket::High => "HIGH",
            VolatilityBucket::Extreme => "EXTREME",
        }
    }
}

impl fmt::Display for VolatilityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative position of the fast and slow EMAs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmaAlignment {
    Bullish,
    Bearish,
}

/// Price relative to the 20-period EMA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceVsEma {
    Above,
    Below,
}

/// Indicator readings supplied by an upstream technical-analysis source
///
/// `adx` drives the regime decision. `atr` and `price` feed the volatility
/// bucket. Trend direction and EMAs are advisory and only echoed into the
/// result metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub adx: f64,
    pub atr: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema_20: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema_50: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn new(adx: f64, atr: f64, price: f64) -> Self {
        Self {
            adx,
            atr,
            price,
            ..Default::default()
        }
    }

    pub fn with_trend(mut self, trend: impl Into<String>) -> Self {
        self.trend_direction = Some(trend.into());
        self
    }

    pub fn with_emas(mut self, ema_20: f64, ema_50: f64) -> Self {
        self.ema_20 = Some(ema_20);
        self.ema_50 = Some(ema_50);
        self
    }

    /// EMA alignment, available only when both EMAs are present
    pub fn ema_alignment(&self) -> Option<EmaAlignment> {
        let (fast, slow) = (self.ema_20?, self.ema_50?);
        Some(if fast > slow {
            EmaAlignment::Bullish
        } else {
            EmaAlignment::Bearish
        })
    }

    /// Price against EMA20; needs both EMAs so the pair is reported together
    pub fn price_vs_ema20(&self) -> Option<PriceVsEma> {
        let (fast, _) = (self.ema_20?, self.ema_50?);
        Some(if self.price > fast {
            PriceVsEma::Above
        } else {
            PriceVsEma::Below
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regime_serde_uses_upper_case() {
        let json = serde_json::to_string(&Regime::Transition).unwrap();
        assert_eq!(json, "\"TRANSITION\"");
        let bucket = serde_json::to_string(&VolatilityBucket::Extreme).unwrap();
        assert_eq!(bucket, "\"EXTREME\"");
    }

    #[test]
    fn test_volatility_bucket_ordering() {
        assert!(VolatilityBucket::Low < VolatilityBucket::Medium);
        assert!(VolatilityBucket::Medium < VolatilityBucket::High);
        assert!(VolatilityBucket::High < VolatilityBucket::Extreme);
    }

    #[test]
    fn test_ema_fields_need_both_emas() {
        let snap = IndicatorSnapshot::new(30.0, 1.0, 100.0);
        assert_eq!(snap.ema_alignment(), None);
        assert_eq!(snap.price_vs_ema20(), None);

        let mut partial = snap.clone();
        partial.ema_20 = Some(99.0);
        assert_eq!(partial.price_vs_ema20(), None);

        let full = snap.with_emas(99.0, 101.0);
        assert_eq!(full.ema_alignment(), Some(EmaAlignment::Bearish));
        assert_eq!(full.price_vs_ema20(), Some(PriceVsEma::Above));
    }

    #[test]
    fn test_symbol_serde_is_transparent() {
        let symbol = Symbol::new("BTCUSDT");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"BTCUSDT\"");
        let parsed: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, symbol);
    }
}
