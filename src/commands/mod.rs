pub mod classify;
pub mod replay;

use anyhow::Result;
use regime_monitor::Config;
use tracing::info;

/// Config from file when given, otherwise defaults plus environment overrides
pub fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::from_file(path)?;
            info!("Loaded configuration from: {}", path);
            Ok(config)
        }
        None => Config::from_env(),
    }
}
