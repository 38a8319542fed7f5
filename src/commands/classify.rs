//! One-shot classification commands

use anyhow::Result;
use regime_monitor::{
    ClassifyOptions, IndicatorSnapshot, RegimeClassifier, Symbol, VolatilityClassifier,
};
use serde_json::json;
use tracing::debug;

use super::load_config;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config_path: Option<String>,
    symbol: String,
    adx: f64,
    atr: f64,
    price: f64,
    trend: Option<String>,
    ema20: Option<f64>,
    ema50: Option<f64>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let classifier = RegimeClassifier::new(&config);

    let snapshot = IndicatorSnapshot {
        adx,
        atr,
        price,
        trend_direction: trend,
        ema_20: ema20,
        ema_50: ema50,
    };
    debug!("Classifying {} with {:?}", symbol, snapshot);

    let outcome = classifier.classify(&Symbol::new(&symbol), &snapshot, ClassifyOptions::default());
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

pub fn run_bucket(config_path: Option<String>, atr: f64, price: f64) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let classifier = VolatilityClassifier::new(config.volatility);

    let output = json!({
        "atr": atr,
        "price": price,
        "atr_pct": VolatilityClassifier::atr_pct(atr, price),
        "volatility_bucket": classifier.bucket(atr, price),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
