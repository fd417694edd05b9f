//! Simple Moving Average of close.
//!
//! SMA(n)[i] = sum(C[i-n+1..=i]) / n
//! Warmup: first (n-1) bars are invalid. n == 0 or n > len yields an all-invalid series.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || period > bars.len() {
        return IndicatorSeries::not_ready(IndicatorType::Sma(period), bars);
    }

    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let valid = i + 1 >= period;
        let value = if valid {
            bars[i + 1 - period..=i].iter().map(|b| b.close).sum::<f64>() / period as f64
        } else {
            0.0
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Simple(value),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                symbol: "TEST".into(),
                timestamp: start + chrono::Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn sma_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0]);
        let series = calculate_sma(&bars, 3);
        assert_eq!(series.values.len(), 4);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn sma_values() {
        let bars = make_bars(&[100.0, 101.0, 99.0, 102.0, 103.0]);
        let sma2 = calculate_sma(&bars, 2);
        let sma3 = calculate_sma(&bars, 3);

        assert_eq!(sma2.simple_at(1), Some(100.5));
        assert_eq!(sma2.simple_at(4), Some(102.5));
        assert_eq!(sma3.simple_at(2), Some(100.0));
        assert!((sma3.simple_at(4).unwrap() - 304.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn sma_window_larger_than_history() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let series = calculate_sma(&bars, 10);
        assert_eq!(series.values.len(), 3);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn sma_zero_period() {
        let bars = make_bars(&[1.0, 2.0]);
        let series = calculate_sma(&bars, 0);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn sma_period_one_is_close() {
        let bars = make_bars(&[5.0, 7.0]);
        let series = calculate_sma(&bars, 1);
        assert_eq!(series.simple_at(0), Some(5.0));
        assert_eq!(series.simple_at(1), Some(7.0));
    }

    #[test]
    fn sma_indicator_type() {
        let series = calculate_sma(&make_bars(&[1.0]), 20);
        assert_eq!(series.indicator_type, IndicatorType::Sma(20));
    }
}
