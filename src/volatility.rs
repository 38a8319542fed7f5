//! Volatility bucketing
//!
//! Maps ATR expressed as a percentage of price into an ordinal bucket.
//! Degenerate inputs (non-positive price, negative ATR, NaN/inf) fall back to
//! `Low` instead of failing, so a bad reading from a feed never stops a
//! polling loop.

use crate::config::VolatilityConfig;
use crate::VolatilityBucket;

/// Stateless classifier over fixed, ordered thresholds
#[derive(Debug, Clone, Default)]
pub struct VolatilityClassifier {
    config: VolatilityConfig,
}

impl VolatilityClassifier {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VolatilityConfig {
        &self.config
    }

    /// ATR as % of price, or `None` when the ratio is undefined
    pub fn atr_pct(atr: f64, price: f64) -> Option<f64> {
        if !atr.is_finite() || !price.is_finite() || price <= 0.0 || atr < 0.0 {
            return None;
        }
        Some(atr / price * 100.0)
    }

    pub fn bucket(&self, atr: f64, price: f64) -> VolatilityBucket {
        match Self::atr_pct(atr, price) {
            Some(pct) => self.bucket_pct(pct),
            None => VolatilityBucket::Low,
        }
    }

    /// Bucket for an already-normalized percentage
    pub fn bucket_pct(&self, atr_pct: f64) -> VolatilityBucket {
        if atr_pct >= self.config.extreme_pct {
            VolatilityBucket::Extreme
        } else if atr_pct >= self.config.high_pct {
            VolatilityBucket::High
        } else if atr_pct >= self.config.medium_pct {
            VolatilityBucket::Medium
        } else {
            VolatilityBucket::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bucket_boundaries_are_inclusive_on_upper_side() {
        let vc = VolatilityClassifier::default();
        // price 100 makes atr equal to atr_pct
        assert_eq!(vc.bucket(0.49, 100.0), VolatilityBucket::Low);
        assert_eq!(vc.bucket(0.5, 100.0), VolatilityBucket::Medium);
        assert_eq!(vc.bucket(1.49, 100.0), VolatilityBucket::Medium);
        assert_eq!(vc.bucket(1.5, 100.0), VolatilityBucket::High);
        assert_eq!(vc.bucket(2.99, 100.0), VolatilityBucket::High);
        assert_eq!(vc.bucket(3.0, 100.0), VolatilityBucket::Extreme);
        assert_eq!(vc.bucket(250.0, 100.0), VolatilityBucket::Extreme);
    }

    #[test]
    fn test_degenerate_inputs_fall_back_to_low() {
        let vc = VolatilityClassifier::default();
        assert_eq!(vc.bucket(5.0, 0.0), VolatilityBucket::Low);
        assert_eq!(vc.bucket(5.0, -10.0), VolatilityBucket::Low);
        assert_eq!(vc.bucket(-1.0, 100.0), VolatilityBucket::Low);
        assert_eq!(vc.bucket(f64::NAN, 100.0), VolatilityBucket::Low);
        assert_eq!(vc.bucket(1.0, f64::INFINITY), VolatilityBucket::Low);
    }

    #[test]
    fn test_atr_pct() {
        assert_relative_eq!(VolatilityClassifier::atr_pct(50.0, 2000.0).unwrap(), 2.5);
        assert_relative_eq!(VolatilityClassifier::atr_pct(0.0, 10.0).unwrap(), 0.0);
        assert_eq!(VolatilityClassifier::atr_pct(1.0, 0.0), None);
        assert_eq!(VolatilityClassifier::atr_pct(-1.0, 10.0), None);
    }

    #[test]
    fn test_custom_thresholds() {
        let vc = VolatilityClassifier::new(VolatilityConfig {
            medium_pct: 1.0,
            high_pct: 2.0,
            extreme_pct: 4.0,
        });
        assert_eq!(vc.bucket_pct(0.9), VolatilityBucket::Low);
        assert_eq!(vc.bucket_pct(3.9), VolatilityBucket::High);
        assert_eq!(vc.bucket_pct(4.0), VolatilityBucket::Extreme);
    }
}
