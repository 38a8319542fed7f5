//! ADX regime classifier with per-symbol hysteresis
//!
//! The instantaneous regime comes straight from ADX:
//!
//! ```text
//! adx >= trend_threshold            -> TREND       confidence = min(100, round(adx / trend * 60))
//! adx <= range_threshold            -> RANGE       confidence = min(100, round((1 - adx / range) * 60 + 40))
//! range_threshold < adx < trend     -> TRANSITION  confidence = 50
//! ```
//!
//! `round` breaks ties to even, so a raw score of 62.5 reports 62.
//!
//! A cached regime is only replaced once it has been in place for at least
//! `min_regime_duration_secs`. Observations that confirm the cached regime
//! reset its age, so only a sustained disagreement overturns it. The dead zone
//! between the thresholds always classifies as TRANSITION.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::cache::{CacheEntry, CacheSummary, RegimeCache};
use super::clock::{Clock, SystemClock};
use crate::config::{Config, RegimeConfig};
use crate::volatility::VolatilityClassifier;
use crate::{
    EmaAlignment, IndicatorSnapshot, PriceVsEma, Regime, Symbol, VolatilityBucket,
};

const TRANSITION_CONFIDENCE: u8 = 50;

/// Per-call switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Skip hysteresis and overwrite the cached regime
    pub force_recalc: bool,
}

impl ClassifyOptions {
    pub fn forced() -> Self {
        Self { force_recalc: true }
    }
}

/// Diagnostics returned with every classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeMetadata {
    pub adx: f64,
    pub atr: f64,
    pub price: f64,
    pub atr_pct: Option<f64>,
    pub volatility_bucket: VolatilityBucket,
    pub confidence: u8,
    pub trend_direction: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// True only when a switch was blocked and the cached regime returned
    pub from_cache: bool,
    pub regime_age_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_switch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_elapsed_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema_alignment: Option<EmaAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_vs_ema20: Option<PriceVsEma>,
}

/// Final regime plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeOutcome {
    pub regime: Regime,
    pub metadata: RegimeMetadata,
}

impl RegimeOutcome {
    pub fn is_blocked(&self) -> bool {
        self.metadata.blocked_switch.is_some()
    }
}

/// What the hysteresis step did with the cache
#[derive(Debug, Clone, Copy, PartialEq)]
enum Decision {
    First,
    Forced,
    Confirmed,
    Switched { from: Regime },
    Blocked {
        from: Regime,
        to: Regime,
        elapsed_secs: f64,
    },
}

/// Regime state machine over an injected cache and clock
#[derive(Debug)]
pub struct RegimeClassifier<C: Clock = SystemClock> {
    config: RegimeConfig,
    volatility: VolatilityClassifier,
    cache: Arc<RegimeCache>,
    clock: C,
}

impl RegimeClassifier<SystemClock> {
    /// Wall-clock classifier with its own empty cache
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RegimeClassifier<C> {
    pub fn with_clock(config: &Config, clock: C) -> Self {
        Self::from_parts(
            config.regime.clone(),
            VolatilityClassifier::new(config.volatility.clone()),
            Arc::new(RegimeCache::new()),
            clock,
        )
    }

    /// Build around a cache owned elsewhere, e.g. shared by an orchestration layer
    pub fn from_parts(
        config: RegimeConfig,
        volatility: VolatilityClassifier,
        cache: Arc<RegimeCache>,
        clock: C,
    ) -> Self {
        Self {
            config,
            volatility,
            cache,
            clock,
        }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RegimeCache> {
        &self.cache
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Regime and confidence from ADX alone, ignoring the cache
    pub fn instantaneous(&self, adx: f64) -> (Regime, u8) {
        if adx >= self.config.trend_threshold {
            let raw = adx / self.config.trend_threshold * 60.0;
            (Regime::Trend, clamp_confidence(raw))
        } else if adx <= self.config.range_threshold {
            let raw = (1.0 - adx / self.config.range_threshold) * 60.0 + 40.0;
            (Regime::Range, clamp_confidence(raw))
        } else {
            (Regime::Transition, TRANSITION_CONFIDENCE)
        }
    }

    pub fn classify(
        &self,
        symbol: &Symbol,
        snapshot: &IndicatorSnapshot,
        options: ClassifyOptions,
    ) -> RegimeOutcome {
        let now = self.clock.now();
        let (observed, confidence) = self.instantaneous(snapshot.adx);
        let min_duration = self.config.min_regime_duration_secs;

        let (regime, decision) = self.cache.update(symbol, |entry| {
            if options.force_recalc {
                *entry = Some(CacheEntry::new(observed, now));
                return (observed, Decision::Forced);
            }

            let Some(cached) = entry.as_mut() else {
                *entry = Some(CacheEntry::new(observed, now));
                return (observed, Decision::First);
            };

            if cached.regime == observed {
                cached.last_update = now;
                return (observed, Decision::Confirmed);
            }

            let elapsed_secs = cached.elapsed_secs(now);
            if elapsed_secs < min_duration {
                return (
                    cached.regime,
                    Decision::Blocked {
                        from: cached.regime,
                        to: observed,
                        elapsed_secs,
                    },
                );
            }

            let from = cached.regime;
            *cached = CacheEntry::new(observed, now);
            (observed, Decision::Switched { from })
        });

        match decision {
            Decision::First => info!("{}: initial regime {} (adx {:.2})", symbol, regime, snapshot.adx),
            Decision::Forced => info!("{}: forced recalculation -> {}", symbol, regime),
            Decision::Switched { from } => {
                info!("{}: regime switch {} -> {} (adx {:.2})", symbol, from, regime, snapshot.adx)
            }
            Decision::Blocked {
                from,
                to,
                elapsed_secs,
            } => debug!(
                "{}: blocked switch {} -> {} after {:.1}s (min {:.0}s)",
                symbol, from, to, elapsed_secs, min_duration
            ),
            Decision::Confirmed => debug!("{}: {} confirmed (adx {:.2})", symbol, regime, snapshot.adx),
        }

        let metadata = self.metadata(snapshot, confidence, now, decision);
        RegimeOutcome { regime, metadata }
    }

    fn metadata(
        &self,
        snapshot: &IndicatorSnapshot,
        confidence: u8,
        now: DateTime<Utc>,
        decision: Decision,
    ) -> RegimeMetadata {
        let atr_pct = VolatilityClassifier::atr_pct(snapshot.atr, snapshot.price);

        let mut metadata = RegimeMetadata {
            adx: round_to(snapshot.adx, 2),
            atr: round_to(snapshot.atr, 4),
            price: round_to(snapshot.price, 2),
            atr_pct: atr_pct.map(|pct| round_to(pct, 3)),
            volatility_bucket: self.volatility.bucket(snapshot.atr, snapshot.price),
            confidence,
            trend_direction: snapshot.trend_direction.clone(),
            timestamp: now,
            from_cache: false,
            regime_age_secs: 0.0,
            blocked_switch: None,
            blocked_elapsed_secs: None,
            min_duration_secs: None,
            ema_alignment: snapshot.ema_alignment(),
            price_vs_ema20: snapshot.price_vs_ema20(),
        };

        if let Decision::Blocked {
            from,
            to,
            elapsed_secs,
        } = decision
        {
            metadata.from_cache = true;
            metadata.regime_age_secs = round_to(elapsed_secs, 1);
            metadata.blocked_switch = Some(format!("{} -> {}", from, to));
            metadata.blocked_elapsed_secs = Some(round_to(elapsed_secs, 1));
            metadata.min_duration_secs = Some(self.config.min_regime_duration_secs);
        }

        metadata
    }

    pub fn clear_cache(&self, symbol: Option<&Symbol>) {
        let removed = self.cache.clear(symbol);
        match symbol {
            Some(symbol) => info!("Cleared regime cache for {} ({} entries)", symbol, removed),
            None => info!("Cleared regime cache ({} entries)", removed),
        }
    }

    pub fn cache_summary(&self) -> CacheSummary {
        self.cache.summary(self.clock.now())
    }
}

fn clamp_confidence(raw: f64) -> u8 {
    raw.round_ties_even().clamp(0.0, 100.0) as u8
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
