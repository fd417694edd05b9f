//! Shared helper functions for indicator calculations.

use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stddev::{calculate_return_volatility, calculate_stddev};
use crate::domain::indicator::vwap::calculate_vwap;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use std::collections::HashMap;

pub fn calculate(bars: &[OhlcvBar], indicator_type: IndicatorType) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(period) => calculate_sma(bars, period),
        IndicatorType::Rsi(period) => calculate_rsi(bars, period),
        IndicatorType::Stddev(period) => calculate_stddev(bars, period),
        IndicatorType::Volatility(period) => calculate_return_volatility(bars, period),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(bars, period, stddev_mult_x100),
        IndicatorType::Vwap { cutover_minutes } => calculate_vwap(bars, cutover_minutes),
    }
}

/// Computes each requested indicator once over the full bar history.
pub fn compute_indicators(
    bars: &[OhlcvBar],
    indicator_types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut out = HashMap::with_capacity(indicator_types.len());
    for &indicator_type in indicator_types {
        out.entry(indicator_type)
            .or_insert_with(|| calculate(bars, indicator_type));
    }
    out
}
