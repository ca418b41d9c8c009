//! theta-backtest CLI
//!
//! # Run a single backtest on a synthetic series
//! theta-backtest run --config config/default.toml
//!
//! # Run on parquet bars and export trades
//! theta-backtest run --config config/default.toml --bars data/nifty.parquet --trades out/trades.csv
//!
//! # Compare several seeds in parallel
//! theta-backtest seeds --config config/default.toml --seeds 1,2,3,4
//!
//! # Print a synthetic option chain
//! theta-backtest chain --spot 22000 --expiry 2024-01-25

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn};

use theta_backtest::backtest::{export_trades_csv, run_seeds, BacktestConfig, BacktestSimulationEngine};
use theta_backtest::data::{generate_series, BarLoader, SyntheticSeriesConfig};
use theta_backtest::pricing::SyntheticChainGenerator;
use theta_backtest::validation::validate_series;

#[derive(Parser)]
#[command(name = "theta-backtest")]
#[command(about = "Options-selling backtester for index derivatives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest
    Run {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parquet file with OHLCV bars; a synthetic series is used otherwise
        #[arg(short, long)]
        bars: Option<PathBuf>,

        /// Seed for the synthetic series
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of synthetic bars
        #[arg(long, default_value_t = 300)]
        bar_count: usize,

        /// Write the trade list as CSV
        #[arg(long)]
        trades: Option<PathBuf>,

        /// Write the full result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Run one synthetic backtest per seed in parallel
    Seeds {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated seeds
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6,7,8")]
        seeds: Vec<u64>,

        /// Number of synthetic bars per seed
        #[arg(long, default_value_t = 300)]
        bar_count: usize,
    },

    /// Print a synthetic option chain
    Chain {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Underlying price
        #[arg(long)]
        spot: Decimal,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: NaiveDate,

        /// Valuation date (YYYY-MM-DD), valued at 09:15
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Annualized volatility
        #[arg(long, default_value_t = 0.14)]
        vol: f64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<BacktestConfig> {
    match path {
        Some(path) => BacktestConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(BacktestConfig::default()),
    }
}

fn cmd_run(
    config: Option<PathBuf>,
    bars_path: Option<PathBuf>,
    seed: u64,
    bar_count: usize,
    trades_path: Option<PathBuf>,
    json_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config.as_ref())?;

    let bars = match &bars_path {
        Some(path) => BarLoader::new(&path.to_string_lossy())
            .load_bars()
            .with_context(|| format!("loading bars from {}", path.display()))?,
        None => generate_series(&SyntheticSeriesConfig {
            seed,
            bars: bar_count,
            ..Default::default()
        }),
    };

    let report = validate_series(&bars);
    if !report.all_passed() {
        warn!("{}", report.summary());
    }

    let result = BacktestSimulationEngine::new(config)
        .context("building engine")?
        .run(&bars);

    println!("{}", result.summary());

    if let Some(path) = trades_path {
        export_trades_csv(&path, &result.trades)
            .with_context(|| format!("writing trades to {}", path.display()))?;
        info!(path = %path.display(), trades = result.trades.len(), "Exported trades");
    }
    if let Some(path) = json_path {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Wrote result");
    }

    Ok(())
}

fn cmd_seeds(config: Option<PathBuf>, seeds: Vec<u64>, bar_count: usize) -> Result<()> {
    let config = load_config(config.as_ref())?;
    let series = SyntheticSeriesConfig {
        bars: bar_count,
        ..Default::default()
    };

    let summaries = run_seeds(&config, &series, &seeds)?;

    println!(
        "{:>6} {:>7} {:>16} {:>9} {:>8} {:>8} {:>7} {:>6}",
        "seed", "trades", "final_capital", "return%", "sharpe", "max_dd%", "win%", "halts"
    );
    for s in &summaries {
        println!(
            "{:>6} {:>7} {:>16.2} {:>9.2} {:>8.2} {:>8.2} {:>7.1} {:>6}",
            s.seed,
            s.trades,
            s.final_capital,
            s.total_return_pct,
            s.sharpe_ratio,
            s.max_drawdown_pct,
            s.win_rate * 100.0,
            s.halts
        );
    }

    Ok(())
}

fn cmd_chain(
    config: Option<PathBuf>,
    spot: Decimal,
    expiry: NaiveDate,
    date: Option<NaiveDate>,
    vol: f64,
) -> Result<()> {
    let config = load_config(config.as_ref())?;
    let generator = SyntheticChainGenerator::new(config.pricer, config.instrument, config.chain);

    let valued_at = date
        .unwrap_or_else(|| chrono::Local::now().date_naive())
        .and_hms_opt(9, 15, 0)
        .context("invalid valuation time")?;
    let chain = generator
        .generate(spot, valued_at, expiry, vol)
        .context("generating chain")?;

    println!(
        "{} spot {} expiry {} ({} DTE), vol {:.1}%",
        chain.underlying,
        chain.spot,
        chain.expiration,
        chain.dte,
        vol * 100.0
    );
    println!(
        "{:>10} {:>8} {:>10} {:>10} | {:>10} {:>10} {:>8}",
        "call_bid", "c_delta", "call_ask", "strike", "put_bid", "put_ask", "p_delta"
    );
    for (call, put) in chain.calls.iter().zip(chain.puts.iter()) {
        println!(
            "{:>10} {:>8.3} {:>10} {:>10} | {:>10} {:>10} {:>8.3}",
            call.bid,
            call.delta(),
            call.ask,
            call.strike,
            put.bid,
            put.ask,
            put.delta()
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("theta_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            bars,
            seed,
            bar_count,
            trades,
            json,
        } => cmd_run(config, bars, seed, bar_count, trades, json),
        Commands::Seeds {
            config,
            seeds,
            bar_count,
        } => cmd_seeds(config, seeds, bar_count),
        Commands::Chain {
            config,
            spot,
            expiry,
            date,
            vol,
        } => cmd_chain(config, spot, expiry, date, vol),
    }
}
