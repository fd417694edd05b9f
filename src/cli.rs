//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_backtest, BacktestResult};
use crate::domain::config_validation::{
    backtest_config, data_dir, output_dir, run_window, strategy_name, strategy_params,
    symbols_value, top_n, validate_backtest_config, validate_strategy_config,
};
use crate::domain::error::CryptobtError;
use crate::domain::price_series::validate_calendar;
use crate::domain::signal::Signal;
use crate::domain::strategy::{build_strategy, generate_all_signals, Strategy, STRATEGIES};
use crate::domain::universe::{resolve_symbols, validate_universe, Universe};
use crate::logging::{default_level, init_logging, LogFormat};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "cryptobt", about = "Multi-asset crypto minute-bar backtester", version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Log line layout
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Report directory (overrides [report] output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated symbols or `all` (overrides [backtest] symbols)
        #[arg(long)]
        symbols: Option<String>,
        /// Directory of <SYMBOL>.csv files (overrides [backtest] data_dir)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Load data and generate signals without simulating
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file without reading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for symbol(s)
    Info {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List built-in strategies and their default parameters
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_format, default_level(cli.verbose, cli.quiet));

    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            symbols,
            data_dir,
            dry_run,
        } => run_backtest_command(
            &config,
            output.as_deref(),
            symbols.as_deref(),
            data_dir.as_deref(),
            dry_run,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            symbol,
            config,
            data_dir,
        } => run_info(symbol.as_deref(), config.as_deref(), data_dir.as_deref()),
        Command::Strategies => {
            run_strategies();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CryptobtError> {
    FileConfigAdapter::from_file(path).map_err(|e| CryptobtError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn build_configured_strategy(config: &dyn ConfigPort) -> Result<Box<dyn Strategy>, CryptobtError> {
    build_strategy(&strategy_name(config)?, &strategy_params(config))
}

fn run_backtest_command(
    config_path: &Path,
    output_override: Option<&Path>,
    symbols_override: Option<&str>,
    data_dir_override: Option<&Path>,
    dry_run: bool,
) -> Result<(), CryptobtError> {
    // Stage 1: load and validate config before touching any data
    info!(path = %config_path.display(), "loading config");
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;

    let bt_config = backtest_config(&adapter)?;
    let (start, end) = run_window(&adapter)?;
    let strategy = build_configured_strategy(&adapter)?;

    // Stage 2: resolve and load the universe
    let data_port = CsvAdapter::new(
        data_dir_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(data_dir(&adapter))),
    );
    let symbols_str = match symbols_override {
        Some(s) => s.to_string(),
        None => symbols_value(&adapter)?,
    };
    let symbols = resolve_symbols(&data_port, &symbols_str)?;
    let mut universe = validate_universe(&data_port, &symbols, start, end)?.universe;
    universe.retain_top_n(top_n(&adapter)?);

    if dry_run {
        return run_dry_run(strategy.as_ref(), &universe);
    }

    // Stage 3: simulate
    eprintln!(
        "Running {}: {} symbols, {} to {}",
        strategy.name(),
        universe.count(),
        start,
        end
    );
    let result = run_backtest(strategy.as_ref(), &universe.series, &bt_config)?;
    print_summary(&result);

    // Stage 4: report
    let output = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(output_dir(&adapter)));
    CsvReportAdapter::new().write(&result, &output)?;
    eprintln!("\nReport written to: {}", output.display());
    Ok(())
}

fn run_dry_run(strategy: &dyn Strategy, universe: &Universe) -> Result<(), CryptobtError> {
    let calendar = validate_calendar(&universe.series)?;
    let signals = generate_all_signals(strategy, &universe.series)?;

    eprintln!(
        "Strategy {}: warm-up {} bars, {} bars per symbol",
        strategy.name(),
        strategy.warmup(),
        calendar.len()
    );
    for s in &signals {
        eprintln!(
            "  {}: {} entries, {} exits",
            s.symbol,
            s.count(Signal::LongEntry),
            s.count(Signal::LongExit)
        );
    }
    eprintln!("\nDry run complete: data and configuration are valid");
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let metrics = &result.metrics;
    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Final Equity:     {:.2}", metrics.final_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Total Fees:       {:.2}", metrics.total_fees);

    if !result.symbols.is_empty() {
        eprintln!("\n=== Per-Symbol Summary ===");
        for sr in &result.symbols {
            let pnl_sign = if sr.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}{:.2}",
                sr.symbol,
                sr.total_trades,
                sr.win_rate * 100.0,
                pnl_sign,
                sr.total_pnl,
            );
        }
    }
}

fn run_validate(config_path: &Path) -> Result<(), CryptobtError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;

    let bt_config = backtest_config(&adapter)?;
    let (start, end) = run_window(&adapter)?;
    let strategy = build_configured_strategy(&adapter)?;

    eprintln!("\nBacktest:");
    eprintln!("  starting capital: {}", bt_config.starting_capital);
    eprintln!("  fee rate:         {}", bt_config.fee_rate);
    eprintln!("  allocation:       {}", bt_config.allocation);
    eprintln!("  window:           {} to {}", start, end);
    eprintln!("  symbols:          {}", symbols_value(&adapter)?);

    eprintln!("\nStrategy {}:", strategy.name());
    eprintln!("  warm-up: {} bars", strategy.warmup());
    let mut indicators: Vec<String> = strategy.indicators().iter().map(|i| i.to_string()).collect();
    indicators.sort();
    for ind in &indicators {
        eprintln!("  {}", ind);
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_info(
    symbol: Option<&str>,
    config_path: Option<&Path>,
    data_dir_override: Option<&Path>,
) -> Result<(), CryptobtError> {
    let dir = match (data_dir_override, config_path) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(path)) => PathBuf::from(data_dir(&load_config(path)?)),
        (None, None) => {
            return Err(CryptobtError::ConfigMissing {
                section: "backtest".to_string(),
                key: "data_dir".to_string(),
            });
        }
    };
    let data_port = CsvAdapter::new(dir);

    let symbols = match symbol {
        Some(s) => vec![s.trim().to_uppercase()],
        None => data_port.list_symbols()?,
    };
    if symbols.is_empty() {
        eprintln!("No symbols found");
        return Ok(());
    }

    for s in &symbols {
        match data_port.data_range(s)? {
            Some((first, last, bars)) => println!("{}: {} to {} ({} bars)", s, first, last, bars),
            None => println!("{}: no data", s),
        }
    }
    Ok(())
}

fn run_strategies() {
    for strategy in STRATEGIES {
        println!("{}  {}", strategy.name, strategy.summary);
        for (key, value) in strategy.defaults {
            println!("    {} = {}", key, value);
        }
    }
}
