//! Standard deviation and return-volatility indicators.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n-1) / n)
//! Warmup: first (n-1) bars are invalid.
//!
//! VOLATILITY(n) is the same statistic over the last n simple returns
//! r[i] = C[i] / C[i-1] - 1, so its first n bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

/// Mean and population standard deviation of a non-empty sample.
pub fn mean_and_stddev<I>(values: I) -> (f64, f64)
where
    I: Iterator<Item = f64> + Clone,
{
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

pub fn calculate_stddev(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || period > bars.len() {
        return IndicatorSeries::not_ready(IndicatorType::Stddev(period), bars);
    }

    let warmup = period - 1;
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let valid = i >= warmup;
            let value = if valid {
                mean_and_stddev(bars[i + 1 - period..=i].iter().map(|b| b.close)).1
            } else {
                0.0
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::Simple(value),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values,
    }
}

pub fn calculate_return_volatility(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || period >= bars.len() {
        return IndicatorSeries::not_ready(IndicatorType::Volatility(period), bars);
    }

    // returns[k] is the return into bar k + 1
    let returns: Vec<f64> = bars
        .windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let valid = i >= period;
            let value = if valid {
                mean_and_stddev(returns[i - period..i].iter().copied()).1
            } else {
                0.0
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::Simple(value),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Volatility(period),
        values,
    }
}
