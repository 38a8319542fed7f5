//! Indicator snapshot loading
//!
//! Reads precomputed indicator readings from CSV files for replay. Expected
//! header (column order is free, the last three columns are optional):
//!
//! ```text
//! timestamp,symbol,adx,atr,price,trend,ema_20,ema_50
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{IndicatorSnapshot, SnapshotError, Symbol};

/// One timestamped reading for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub snapshot: IndicatorSnapshot,
}

struct Columns {
    timestamp: usize,
    symbol: usize,
    adx: usize,
    atr: usize,
    price: usize,
    trend: Option<usize>,
    ema_20: Option<usize>,
    ema_50: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let require = |name: &str| find(name).with_context(|| format!("Missing {} column", name));

        Ok(Columns {
            timestamp: require("timestamp")?,
            symbol: require("symbol")?,
            adx: require("adx")?,
            atr: require("atr")?,
            price: require("price")?,
            trend: find("trend"),
            ema_20: find("ema_20"),
            ema_50: find("ema_50"),
        })
    }
}

/// Parse RFC 3339, falling back to a naive `%Y-%m-%d %H:%M:%S` in UTC
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .with_context(|| format!("Failed to parse timestamp: {}", raw))
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, SnapshotError> {
    raw.trim().parse().map_err(|_| SnapshotError::NotANumber {
        field,
        value: raw.to_string(),
    })
}

fn parse_optional_f64(field: &'static str, raw: Option<&str>) -> Result<Option<f64>, SnapshotError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_f64(field, value).map(Some),
    }
}

/// Load snapshot rows from one CSV file, in file order
pub fn load_snapshots(path: impl AsRef<Path>) -> Result<Vec<SnapshotRow>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let columns = Columns::from_headers(reader.headers().context("Failed to read CSV header")?)?;
    let mut rows = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let row = parse_row(&record, &columns)
            .with_context(|| format!("{}: invalid row {}", path.display(), row_idx + 1))?;
        rows.push(row);
    }

    Ok(rows)
}

fn parse_row(record: &csv::StringRecord, columns: &Columns) -> Result<SnapshotRow> {
    let get = |idx: usize| record.get(idx).unwrap_or("");
    let optional = |idx: Option<usize>| idx.and_then(|i| record.get(i));

    let symbol = get(columns.symbol).trim();
    if symbol.is_empty() {
        return Err(SnapshotError::EmptySymbol.into());
    }

    let trend_direction = optional(columns.trend)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(SnapshotRow {
        timestamp: parse_timestamp(get(columns.timestamp))?,
        symbol: Symbol::new(symbol),
        snapshot: IndicatorSnapshot {
            adx: parse_f64("adx", get(columns.adx))?,
            atr: parse_f64("atr", get(columns.atr))?,
            price: parse_f64("price", get(columns.price))?,
            trend_direction,
            ema_20: parse_optional_f64("ema_20", optional(columns.ema_20))?,
            ema_50: parse_optional_f64("ema_50", optional(columns.ema_50))?,
        },
    })
}

/// Load several files in parallel and merge them into one timeline.
///
/// Rows with equal timestamps keep their file order, then their order within
/// the file.
pub fn load_many(paths: &[PathBuf]) -> Result<Vec<SnapshotRow>> {
    let per_file: Vec<Vec<SnapshotRow>> = paths
        .par_iter()
        .map(|path| -> Result<Vec<SnapshotRow>> {
            let rows = load_snapshots(path)?;
            info!("Loaded {} snapshots from {}", rows.len(), path.display());
            Ok(rows)
        })
        .collect::<Result<_>>()?;

    let mut rows: Vec<SnapshotRow> = per_file.into_iter().flatten().collect();
    if rows.is_empty() {
        anyhow::bail!("No snapshots loaded");
    }

    rows.sort_by_key(|row| row.timestamp);
    Ok(rows)
}

/// All `*.csv` files directly under `data_dir`, sorted by name
pub fn find_snapshot_files(data_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let data_dir = data_dir.as_ref();
    let mut files: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .with_context(|| format!("Failed to read data directory: {}", data_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();

    if files.is_empty() {
        warn!("No CSV files found in {}", data_dir.display());
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn write_csv(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("regime_monitor_data_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:15:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01 10:15:00").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_load_snapshots_with_optional_columns() {
        let path = write_csv(
            "optional.csv",
            "timestamp,symbol,adx,atr,price,trend,ema_20,ema_50\n\
             2024-05-01T10:00:00Z,BTCUSDT,31.5,900,60000,up,59000,58000\n\
             2024-05-01T10:05:00Z,BTCUSDT,18.0,850,60100,,,\n",
        );

        let rows = load_snapshots(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, Symbol::new("BTCUSDT"));
        assert_eq!(rows[0].snapshot.trend_direction.as_deref(), Some("up"));
        assert_eq!(rows[0].snapshot.ema_50, Some(58000.0));
        assert_eq!(rows[1].snapshot.trend_direction, None);
        assert_eq!(rows[1].snapshot.ema_20, None);
    }

    #[test]
    fn test_load_snapshots_rejects_bad_numbers() {
        let path = write_csv(
            "bad.csv",
            "timestamp,symbol,adx,atr,price\n2024-05-01T10:00:00Z,BTCUSDT,abc,1,100\n",
        );
        let err = load_snapshots(&path).unwrap_err();
        let snapshot_err = err.downcast_ref::<SnapshotError>().unwrap();
        assert_eq!(
            snapshot_err,
            &SnapshotError::NotANumber {
                field: "adx",
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_load_snapshots_requires_columns() {
        let path = write_csv("missing.csv", "timestamp,symbol,adx\n2024-05-01T10:00:00Z,BTCUSDT,1\n");
        assert!(load_snapshots(&path).is_err());
    }

    #[test]
    fn test_load_many_merges_by_timestamp() {
        let a = write_csv(
            "merge_a.csv",
            "timestamp,symbol,adx,atr,price\n\
             2024-05-01T10:00:00Z,BTCUSDT,30,1,100\n\
             2024-05-01T10:10:00Z,BTCUSDT,30,1,100\n",
        );
        let b = write_csv(
            "merge_b.csv",
            "timestamp,symbol,adx,atr,price\n2024-05-01T10:05:00Z,ETHUSDT,15,1,100\n",
        );

        let rows = load_many(&[a, b]).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "BTCUSDT"]);
    }
}
