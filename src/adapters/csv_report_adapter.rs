//! CSV report adapter implementing ReportPort.
//!
//! Writes one table per concern into the output directory: `trades.csv`,
//! `equity.csv`, `metrics.csv`, `symbols.csv` and `monthly.csv`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Datelike;
use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CryptobtError;
use crate::domain::portfolio::EquityPoint;
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const METRICS_FILE: &str = "metrics.csv";
pub const SYMBOLS_FILE: &str = "symbols.csv";
pub const MONTHLY_FILE: &str = "monthly.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    /// Compounded return over the month, as a fraction.
    pub return_pct: f64,
}

/// Month-by-month compounded returns of the equity curve.
pub fn compute_monthly_returns(equity_curve: &[EquityPoint]) -> Vec<MonthlyReturn> {
    let mut log_returns: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for window in equity_curve.windows(2) {
        let (prev, curr) = (&window[0], &window[1]);
        if prev.equity <= 0.0 || curr.equity <= 0.0 {
            continue;
        }
        let key = (curr.timestamp.year(), curr.timestamp.month());
        *log_returns.entry(key).or_default() += (curr.equity / prev.equity).ln();
    }

    log_returns
        .into_iter()
        .map(|((year, month), log_sum)| MonthlyReturn {
            year,
            month,
            return_pct: log_sum.exp_m1(),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), CryptobtError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), CryptobtError> {
        fs::create_dir_all(output_dir)?;

        write_rows(&output_dir.join(TRADES_FILE), &result.ledger.trades)?;
        write_rows(&output_dir.join(EQUITY_FILE), &result.ledger.equity_curve)?;
        write_rows(&output_dir.join(METRICS_FILE), std::slice::from_ref(&result.metrics))?;
        write_rows(&output_dir.join(SYMBOLS_FILE), &result.symbols)?;
        write_rows(
            &output_dir.join(MONTHLY_FILE),
            &compute_monthly_returns(&result.ledger.equity_curve),
        )?;

        info!(
            dir = %output_dir.display(),
            trades = result.ledger.trades.len(),
            "report written"
        );
        Ok(())
    }
}
