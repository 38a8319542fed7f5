//! Regime monitor - main entry point
//!
//! This binary provides three subcommands:
//! - classify: Classify one indicator snapshot
//! - bucket: Bucket ATR/price into a volatility level
//! - replay: Replay historical snapshots through the hysteresis state machine

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "regime-monitor")]
#[command(about = "Market regime classification with hysteresis", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file (defaults plus REGIME_* env overrides when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a single indicator snapshot
    #[command(allow_negative_numbers = true)]
    Classify {
        /// Trading pair, e.g. "BTCUSDT"
        #[arg(short, long)]
        symbol: String,

        /// Average Directional Index
        #[arg(long)]
        adx: f64,

        /// Average True Range in price units
        #[arg(long)]
        atr: f64,

        /// Current price
        #[arg(long)]
        price: f64,

        /// Trend direction reported upstream (echoed only)
        #[arg(long)]
        trend: Option<String>,

        /// 20-period EMA
        #[arg(long)]
        ema20: Option<f64>,

        /// 50-period EMA
        #[arg(long)]
        ema50: Option<f64>,
    },

    /// Bucket volatility from ATR and price
    #[command(allow_negative_numbers = true)]
    Bucket {
        #[arg(long)]
        atr: f64,

        #[arg(long)]
        price: f64,
    },

    /// Replay snapshot CSV files through the classifier
    Replay {
        /// Snapshot CSV files (defaults to every CSV in the configured data_dir)
        #[arg(short, long, num_args = 1..)]
        data: Vec<PathBuf>,

        /// Timeline CSV output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if file_only {
        // stdout carries JSON output, keep it clean
        let file_appender = tracing_appender::rolling::never("logs", &log_filename);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        // File layer - same format but without ANSI colors
        let file_appender = tracing_appender::rolling::never("logs", &log_filename);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Classify { .. } => ("classify", true),
        Commands::Bucket { .. } => ("bucket", true),
        Commands::Replay { .. } => ("replay", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Classify {
            symbol,
            adx,
            atr,
            price,
            trend,
            ema20,
            ema50,
        } => commands::classify::run(cli.config, symbol, adx, atr, price, trend, ema20, ema50),

        Commands::Bucket { atr, price } => commands::classify::run_bucket(cli.config, atr, price),

        Commands::Replay { data, output } => commands::replay::run(cli.config, data, output),
    }
}
