//! Configuration validation.
//!
//! Validates every config field before any data is read, and turns the
//! validated values into domain configuration.

use crate::domain::allocation::AllocationPolicy;
use crate::domain::backtest::BacktestConfig;
use crate::domain::error::CryptobtError;
use crate::domain::strategy::{build_strategy, StrategyParams};
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveDateTime};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT_DIR: &str = "report";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CryptobtError> {
    backtest_config(config)?;
    run_window(config)?;
    validate_symbols(config)?;
    top_n(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), CryptobtError> {
    let name = strategy_name(config)?;
    build_strategy(&name, &strategy_params(config))?;
    Ok(())
}

/// Simulator settings from `[backtest]`.
pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CryptobtError> {
    let defaults = BacktestConfig::default();

    let starting_capital = read_double(config, "starting_capital", defaults.starting_capital)?;
    if starting_capital <= 0.0 {
        return Err(CryptobtError::invalid_config(
            "backtest",
            "starting_capital",
            "starting_capital must be positive",
        ));
    }

    let fee_rate = read_double(config, "fee_rate", defaults.fee_rate)?;
    if !(0.0..1.0).contains(&fee_rate) {
        return Err(CryptobtError::invalid_config(
            "backtest",
            "fee_rate",
            "fee_rate must be in [0, 1)",
        ));
    }

    let risk_free_rate = read_double(config, "risk_free_rate", defaults.risk_free_rate)?;
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(CryptobtError::invalid_config(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let max_positions = read_count(config, "max_positions")?;
    let allocation = match config.get_string("backtest", "allocation_policy") {
        Some(name) => AllocationPolicy::parse(&name, max_positions)?,
        None => AllocationPolicy::EqualWeight { max_positions },
    };

    let backtest = BacktestConfig {
        starting_capital,
        fee_rate,
        allocation,
        risk_free_rate,
    };
    backtest.validate()?;
    Ok(backtest)
}

/// Inclusive `[start, end]` range to load.
pub fn run_window(config: &dyn ConfigPort) -> Result<(NaiveDateTime, NaiveDateTime), CryptobtError> {
    let start = parse_timestamp(config.get_string("backtest", "start").as_deref(), "start", false)?;
    let end = parse_timestamp(config.get_string("backtest", "end").as_deref(), "end", true)?;

    if start >= end {
        return Err(CryptobtError::invalid_config(
            "backtest",
            "start",
            "start must be before end",
        ));
    }
    Ok((start, end))
}

/// Accepts `YYYY-MM-DD HH:MM:SS` or a bare date; a bare `end` date covers the whole day.
fn parse_timestamp(
    value: Option<&str>,
    field: &str,
    end_of_day: bool,
) -> Result<NaiveDateTime, CryptobtError> {
    let s = value.map(str::trim).ok_or_else(|| CryptobtError::ConfigMissing {
        section: "backtest".to_string(),
        key: field.to_string(),
    })?;

    if let Ok(ts) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        CryptobtError::invalid_config(
            "backtest",
            field,
            format!("invalid {} format, expected YYYY-MM-DD HH:MM:SS", field),
        )
    })?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.ok_or_else(|| CryptobtError::invalid_config("backtest", field, "invalid date"))
}

/// Raw `symbols` value: a comma list or `all`.
pub fn symbols_value(config: &dyn ConfigPort) -> Result<String, CryptobtError> {
    match config.get_string("backtest", "symbols") {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(CryptobtError::ConfigMissing {
            section: "backtest".to_string(),
            key: "symbols".to_string(),
        }),
    }
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), CryptobtError> {
    let value = symbols_value(config)?;
    if !value.trim().eq_ignore_ascii_case(crate::domain::universe::ALL_SYMBOLS) {
        crate::domain::universe::parse_symbols(&value)?;
    }
    Ok(())
}

/// Liquidity filter size; 0 keeps every symbol.
pub fn top_n(config: &dyn ConfigPort) -> Result<usize, CryptobtError> {
    read_count(config, "top_n")
}

pub fn data_dir(config: &dyn ConfigPort) -> String {
    config
        .get_string("backtest", "data_dir")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
}

pub fn output_dir(config: &dyn ConfigPort) -> String {
    config
        .get_string("report", "output_dir")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string())
}

pub fn strategy_name(config: &dyn ConfigPort) -> Result<String, CryptobtError> {
    match config.get_string("strategy", "name") {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(CryptobtError::ConfigMissing {
            section: "strategy".to_string(),
            key: "name".to_string(),
        }),
    }
}

/// Every `[strategy]` key except `name`.
pub fn strategy_params(config: &dyn ConfigPort) -> StrategyParams {
    let mut params = StrategyParams::new();
    for (key, value) in config.get_section("strategy") {
        if key != "name" {
            params.insert(&key, value);
        }
    }
    params
}

// A value that is present but not a number is an error, never the default.
fn read_double(config: &dyn ConfigPort, key: &str, default: f64) -> Result<f64, CryptobtError> {
    match config.get_string("backtest", key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                CryptobtError::invalid_config("backtest", key, format!("'{}' is not a number", raw))
            }),
    }
}

fn read_count(config: &dyn ConfigPort, key: &str) -> Result<usize, CryptobtError> {
    match config.get_string("backtest", key) {
        None => Ok(0),
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            CryptobtError::invalid_config(
                "backtest",
                key,
                format!("{} must be a non-negative integer", key),
            )
        }),
    }
}
