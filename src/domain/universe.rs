//! Trading universe: the set of pairs a run trades over.
//!
//! Parses the configured symbol list, loads each pair through the data port and
//! optionally keeps only the most liquid pairs by quote volume.

use crate::domain::error::CryptobtError;
use crate::domain::price_series::PriceSeries;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{info, warn};

/// Symbol list value that selects every pair the data port knows about.
pub const ALL_SYMBOLS: &str = "all";

#[derive(Debug, Clone)]
pub struct Universe {
    pub series: Vec<PriceSeries>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.series.len()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.series.iter().map(PriceSeries::symbol).collect()
    }

    /// Keeps the `top_n` pairs with the highest quote volume; 0 keeps everything.
    ///
    /// Volume is summed over every loaded bar, so the ranking uses the whole run
    /// window, later bars included. The result stays in symbol order.
    pub fn retain_top_n(&mut self, top_n: usize) {
        if top_n == 0 || top_n >= self.series.len() {
            return;
        }
        self.series.sort_by(|a, b| {
            b.quote_volume()
                .total_cmp(&a.quote_volume())
                .then_with(|| a.symbol().cmp(b.symbol()))
        });
        for dropped in &self.series[top_n..] {
            info!(
                symbol = dropped.symbol(),
                quote_volume = dropped.quote_volume(),
                "dropped by liquidity filter"
            );
        }
        self.series.truncate(top_n);
        self.series.sort_by(|a, b| a.symbol().cmp(b.symbol()));
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl From<UniverseError> for CryptobtError {
    fn from(err: UniverseError) -> Self {
        CryptobtError::invalid_config("backtest", "symbols", err.to_string())
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Expands `all` through the data port, otherwise parses the comma list.
pub fn resolve_symbols(
    data_port: &dyn DataPort,
    input: &str,
) -> Result<Vec<String>, CryptobtError> {
    if input.trim().eq_ignore_ascii_case(ALL_SYMBOLS) {
        let mut symbols = data_port.list_symbols()?;
        symbols.sort();
        if symbols.is_empty() {
            return Err(CryptobtError::NoData {
                symbol: ALL_SYMBOLS.to_string(),
            });
        }
        return Ok(symbols);
    }
    Ok(parse_symbols(input)?)
}

#[derive(Debug, Clone)]
pub struct UniverseValidationResult {
    pub universe: Universe,
    pub skipped: Vec<SkippedSymbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Loads every symbol over `[start, end]`.
///
/// Symbols without data are skipped with a warning; any other failure aborts.
pub fn validate_universe(
    data_port: &dyn DataPort,
    symbols: &[String],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<UniverseValidationResult, CryptobtError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        match data_port.fetch_series(symbol, start, end) {
            Ok(s) => {
                info!(symbol = symbol.as_str(), bars = s.len(), "loaded");
                series.push(s);
            }
            Err(e @ CryptobtError::NoData { .. }) => {
                warn!(symbol = symbol.as_str(), error = %e, "skipping symbol");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    if series.is_empty() {
        return Err(CryptobtError::NoData {
            symbol: ALL_SYMBOLS.to_string(),
        });
    }

    if !skipped.is_empty() {
        warn!(
            kept = series.len(),
            requested = symbols.len(),
            "some symbols had no data"
        );
    }

    series.sort_by(|a, b| a.symbol().cmp(b.symbol()));
    Ok(UniverseValidationResult {
        universe: Universe { series },
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{Duration, NaiveDate};

    fn series(symbol: &str, close: f64, volume: f64) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = (0..3)
            .map(|i| OhlcvBar {
                symbol: symbol.into(),
                timestamp: start + Duration::minutes(i),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("BTCUSDT,ETHUSDT,SOLUSDT").unwrap();
        assert_eq!(result, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    }

    #[test]
    fn parse_symbols_trims_and_uppercases() {
        let result = parse_symbols("  btcusdt , EthUsdt ").unwrap();
        assert_eq!(result, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        assert_eq!(parse_symbols("BTCUSDT,,ETHUSDT"), Err(UniverseError::EmptyToken));
        assert_eq!(parse_symbols(""), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_symbols_duplicate() {
        let result = parse_symbols("BTCUSDT,ETHUSDT,btcusdt");
        assert_eq!(result, Err(UniverseError::DuplicateSymbol("BTCUSDT".into())));
    }

    #[test]
    fn universe_error_is_config_error() {
        let err: CryptobtError = UniverseError::EmptyToken.into();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn retain_top_n_by_quote_volume() {
        let mut universe = Universe {
            series: vec![
                series("ADAUSDT", 1.0, 100.0),
                series("BTCUSDT", 100.0, 10.0),
                series("ETHUSDT", 10.0, 50.0),
            ],
        };
        universe.retain_top_n(2);
        assert_eq!(universe.symbols(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn retain_top_n_zero_keeps_all() {
        let mut universe = Universe {
            series: vec![series("ADAUSDT", 1.0, 1.0), series("BTCUSDT", 1.0, 2.0)],
        };
        universe.retain_top_n(0);
        assert_eq!(universe.count(), 2);
        universe.retain_top_n(5);
        assert_eq!(universe.count(), 2);
    }

    #[test]
    fn retain_top_n_ties_break_on_symbol() {
        let mut universe = Universe {
            series: vec![series("ETHUSDT", 1.0, 1.0), series("BTCUSDT", 1.0, 1.0)],
        };
        universe.retain_top_n(1);
        assert_eq!(universe.symbols(), vec!["BTCUSDT"]);
    }

    #[test]
    fn retain_top_n_counts_every_loaded_bar() {
        // ADAUSDT trades nothing until its last bar, then outweighs BTCUSDT
        let mut late = series("ADAUSDT", 1.0, 0.0);
        let mut bars = late.bars().to_vec();
        bars[2].volume = 1_000.0;
        late = PriceSeries::new("ADAUSDT", bars).unwrap();

        let mut universe = Universe {
            series: vec![late, series("BTCUSDT", 1.0, 100.0)],
        };
        universe.retain_top_n(1);
        assert_eq!(universe.symbols(), vec!["ADAUSDT"]);
    }
}
