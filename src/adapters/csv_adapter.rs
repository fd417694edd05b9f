//! CSV minute-bar data adapter.
//!
//! One file per pair at `<base_path>/<SYMBOL>.csv` with the header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::error::CryptobtError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Epoch values above this are microseconds rather than milliseconds.
const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Every bar in the symbol's file, in file order.
    fn read_all(&self, symbol: &str) -> Result<Vec<OhlcvBar>, CryptobtError> {
        let path = self.csv_path(symbol);
        if !path.is_file() {
            return Err(CryptobtError::NoData {
                symbol: symbol.to_string(),
            });
        }
        read_bars(&path, symbol)
    }
}

fn read_bars(path: &Path, symbol: &str) -> Result<Vec<OhlcvBar>, CryptobtError> {
    let data_error = |reason: String| CryptobtError::Data {
        reason: format!("{}: {}", path.display(), reason),
    };

    let mut rdr = csv::Reader::from_path(path).map_err(|e| data_error(e.to_string()))?;
    let mut bars: Vec<OhlcvBar> = Vec::new();

    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            // header is line 1
            data_error(format!("line {}: invalid timestamp '{}'", line + 2, row.timestamp))
        })?;
        if let Some(prev) = bars.last().map(|b| b.timestamp) {
            if timestamp <= prev {
                return Err(CryptobtError::InvalidSeries {
                    symbol: symbol.to_string(),
                    reason: format!(
                        "{} line {}: timestamp {} does not follow {}",
                        path.display(),
                        line + 2,
                        timestamp,
                        prev
                    ),
                });
            }
        }
        bars.push(OhlcvBar {
            symbol: symbol.to_string(),
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    Ok(bars)
}

/// `YYYY-MM-DD HH:MM:SS`, or integer epoch milliseconds (microseconds accepted).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(epoch) = raw.parse::<i64>() {
        let dt = if epoch.abs() >= MICROS_THRESHOLD {
            DateTime::from_timestamp_micros(epoch)
        } else {
            DateTime::from_timestamp_millis(epoch)
        };
        return dt.map(|d| d.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<OhlcvBar>, CryptobtError> {
        let bars: Vec<OhlcvBar> = self
            .read_all(symbol)?
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();

        if bars.is_empty() {
            return Err(CryptobtError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, CryptobtError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| CryptobtError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, CryptobtError> {
        let bars = match self.read_all(symbol) {
            Ok(bars) => bars,
            Err(CryptobtError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}
