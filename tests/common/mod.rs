#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use cryptobt::domain::allocation::AllocationPolicy;
use cryptobt::domain::backtest::BacktestConfig;
use cryptobt::domain::error::CryptobtError;
pub use cryptobt::domain::ohlcv::OhlcvBar;
use cryptobt::domain::price_series::PriceSeries;
use cryptobt::domain::signal::{Signal, SignalSeries};
use cryptobt::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<OhlcvBar>, CryptobtError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(CryptobtError::Data {
                reason: reason.clone(),
            });
        }
        let bars: Vec<OhlcvBar> = self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(CryptobtError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, CryptobtError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, CryptobtError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.timestamp).min().unwrap();
                let max = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Minute `minute` after 2025-02-01 00:00:00.
pub fn ts(minute: i64) -> NaiveDateTime {
    start_time() + Duration::minutes(minute)
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 2, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(symbol: &str, minute: i64, open: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        timestamp: ts(minute),
        open,
        high: open.max(close) + 0.5,
        low: (open.min(close) - 0.5).max(0.01),
        close,
        volume: 10.0,
    }
}

/// Minute bars whose open equals the previous close.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            make_bar(symbol, i as i64, open, close)
        })
        .collect()
}

pub fn bars_from_opens_closes(symbol: &str, opens: &[f64], closes: &[f64]) -> Vec<OhlcvBar> {
    opens
        .iter()
        .zip(closes)
        .enumerate()
        .map(|(i, (&open, &close))| make_bar(symbol, i as i64, open, close))
        .collect()
}

pub fn series_from_closes(symbol: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(symbol, bars_from_closes(symbol, closes)).unwrap()
}

pub fn series_from_opens_closes(symbol: &str, opens: &[f64], closes: &[f64]) -> PriceSeries {
    PriceSeries::new(symbol, bars_from_opens_closes(symbol, opens, closes)).unwrap()
}

/// Deterministic zig-zag walk that produces plenty of crossovers.
pub fn wave_closes(count: usize, start_price: f64, phase: f64) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64 + phase;
            start_price * (1.0 + 0.03 * (t / 7.0).sin() + 0.01 * (t / 2.0).cos())
        })
        .collect()
}

pub fn signal_series(symbol: &str, signals: &[Signal]) -> SignalSeries {
    SignalSeries::new(symbol, signals.to_vec())
}

pub fn zero_fee_config(starting_capital: f64) -> BacktestConfig {
    BacktestConfig {
        starting_capital,
        fee_rate: 0.0,
        allocation: AllocationPolicy::default(),
        risk_free_rate: 0.0,
    }
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        starting_capital: 10_000.0,
        fee_rate: 0.001,
        allocation: AllocationPolicy::default(),
        risk_free_rate: 0.0,
    }
}

/// Writes `bars` to `<dir>/<symbol>.csv` in the data adapter's format.
pub fn write_csv(dir: &Path, symbol: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}
