//! Replay command implementation

use anyhow::Result;
use regime_monitor::data;
use regime_monitor::replay::Replayer;
use std::path::PathBuf;
use tracing::{debug, info};

use super::load_config;

pub fn run(
    config_path: Option<String>,
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    info!("Starting replay");

    let config = load_config(config_path.as_deref())?;
    debug!("Regime config: {:?}", config.regime);

    let files = if files.is_empty() {
        info!("Scanning data directory: {}", config.replay.data_dir);
        data::find_snapshot_files(&config.replay.data_dir)?
    } else {
        files
    };

    let rows = data::load_many(&files)?;
    info!("Loaded {} snapshots from {} files", rows.len(), files.len());

    let report = Replayer::new(&config).run(&rows);
    report.log_summary();

    let output = output.unwrap_or_else(|| {
        PathBuf::from(&config.replay.results_dir).join(format!(
            "regime_replay_{}.csv",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))
    });
    report.write_csv(&output)?;

    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}
