//! Historical replay
//!
//! Feeds a timestamped snapshot series through a classifier whose clock is
//! moved to each row's timestamp, so hysteresis behaves exactly as it would
//! have live.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::data::SnapshotRow;
use crate::regime::{CacheSummary, ClassifyOptions, ManualClock, RegimeClassifier};
use crate::{Regime, Symbol, VolatilityBucket};

/// One classified row of the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub adx: f64,
    pub regime: Regime,
    pub confidence: u8,
    pub volatility_bucket: VolatilityBucket,
    pub atr_pct: Option<f64>,
    pub from_cache: bool,
    pub blocked_switch: Option<String>,
    pub regime_age_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolStats {
    pub observations: usize,
    /// Changes of the returned regime between consecutive rows
    pub switches: usize,
    pub blocked: usize,
    pub trend: usize,
    pub range: usize,
    pub transition: usize,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub records: Vec<ReplayRecord>,
    pub stats: BTreeMap<Symbol, SymbolStats>,
    pub summary: CacheSummary,
}

impl ReplayReport {
    /// Write the timeline as CSV
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!("Wrote {} replay rows to {}", self.records.len(), path.display());
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            "Replayed {} rows across {} symbols",
            self.records.len(),
            self.stats.len()
        );
        for (symbol, stats) in &self.stats {
            info!(
                "{}: {} obs, {} switches, {} blocked (TREND {}, RANGE {}, TRANSITION {})",
                symbol,
                stats.observations,
                stats.switches,
                stats.blocked,
                stats.trend,
                stats.range,
                stats.transition
            );
        }
    }
}

/// Replays snapshot rows through a dedicated classifier and cache
pub struct Replayer {
    classifier: RegimeClassifier<ManualClock>,
}

impl Replayer {
    pub fn new(config: &Config) -> Self {
        Self {
            classifier: RegimeClassifier::with_clock(config, ManualClock::new(DateTime::<Utc>::UNIX_EPOCH)),
        }
    }

    pub fn classifier(&self) -> &RegimeClassifier<ManualClock> {
        &self.classifier
    }

    /// Classify rows in the order given; callers sort by timestamp first
    pub fn run(&self, rows: &[SnapshotRow]) -> ReplayReport {
        let records: Vec<ReplayRecord> = rows
            .iter()
            .map(|row| {
                self.classifier.clock().set(row.timestamp);
                let outcome = self.classifier.classify(&row.symbol, &row.snapshot, ClassifyOptions::default());
                let md = outcome.metadata;

                ReplayRecord {
                    timestamp: row.timestamp,
                    symbol: row.symbol.clone(),
                    adx: md.adx,
                    regime: outcome.regime,
                    confidence: md.confidence,
                    volatility_bucket: md.volatility_bucket,
                    atr_pct: md.atr_pct,
                    from_cache: md.from_cache,
                    blocked_switch: md.blocked_switch,
                    regime_age_secs: md.regime_age_secs,
                }
            })
            .collect();

        let stats = symbol_stats(&records);
        let summary = self.classifier.cache_summary();

        ReplayReport {
            records,
            stats,
            summary,
        }
    }
}

fn symbol_stats(records: &[ReplayRecord]) -> BTreeMap<Symbol, SymbolStats> {
    records
        .iter()
        .into_group_map_by(|r| r.symbol.clone())
        .into_iter()
        .map(|(symbol, rows)| {
            let mut stats = SymbolStats {
                observations: rows.len(),
                switches: rows
                    .iter()
                    .tuple_windows()
                    .filter(|(prev, next)| prev.regime != next.regime)
                    .count(),
                blocked: rows.iter().filter(|r| r.from_cache).count(),
                ..Default::default()
            };
            for row in &rows {
                match row.regime {
                    Regime::Trend => stats.trend += 1,
                    Regime::Range => stats.range += 1,
                    Regime::Transition => stats.transition += 1,
                }
            }
            (symbol, stats)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndicatorSnapshot;
    use chrono::{Duration, TimeZone};

    fn row(secs: i64, symbol: &str, adx: f64) -> SnapshotRow {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        SnapshotRow {
            timestamp: t0 + Duration::seconds(secs),
            symbol: Symbol::new(symbol),
            snapshot: IndicatorSnapshot::new(adx, 1.0, 100.0),
        }
    }

    #[test]
    fn test_replay_applies_hysteresis_on_row_timestamps() {
        let rows = vec![
            row(0, "BTCUSDT", 30.0),
            row(60, "BTCUSDT", 12.0),
            row(120, "BTCUSDT", 12.0),
            row(400, "BTCUSDT", 12.0),
            row(460, "BTCUSDT", 12.0),
        ];

        let report = Replayer::new(&Config::default()).run(&rows);
        let regimes: Vec<Regime> = report.records.iter().map(|r| r.regime).collect();
        assert_eq!(
            regimes,
            vec![Regime::Trend, Regime::Trend, Regime::Trend, Regime::Range, Regime::Range]
        );

        let stats = &report.stats[&Symbol::new("BTCUSDT")];
        assert_eq!(stats.observations, 5);
        assert_eq!(stats.switches, 1);
        assert_eq!(stats.blocked, 2);
        assert_eq!(stats.trend, 3);
        assert_eq!(stats.range, 2);
    }

    #[test]
    fn test_replay_keeps_symbols_independent() {
        let rows = vec![
            row(0, "BTCUSDT", 30.0),
            row(10, "ETHUSDT", 10.0),
            row(20, "ETHUSDT", 40.0),
            row(30, "BTCUSDT", 31.0),
        ];

        let report = Replayer::new(&Config::default()).run(&rows);
        assert_eq!(report.summary.tracked_symbols, 2);
        assert_eq!(report.summary.symbols[&Symbol::new("BTCUSDT")].regime, Regime::Trend);
        assert_eq!(report.summary.symbols[&Symbol::new("ETHUSDT")].regime, Regime::Range);
        assert_eq!(report.stats[&Symbol::new("ETHUSDT")].blocked, 1);
        assert_eq!(report.stats[&Symbol::new("BTCUSDT")].blocked, 0);
    }

    #[test]
    fn test_write_csv() {
        let rows = vec![row(0, "BTCUSDT", 30.0), row(30, "BTCUSDT", 10.0)];
        let report = Replayer::new(&Config::default()).run(&rows);

        let path = std::env::temp_dir()
            .join(format!("regime_monitor_replay_{}", std::process::id()))
            .join("timeline.csv");
        report.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,symbol,adx,regime,confidence,volatility_bucket,atr_pct,from_cache,blocked_switch,regime_age_secs"
        );
        assert!(lines.next().unwrap().contains(",TREND,72,MEDIUM,"));
        assert!(lines.next().unwrap().contains("TREND -> RANGE"));
    }
}
