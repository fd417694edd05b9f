//! Moving-average crossover with a return-volatility filter.
//!
//! Long entry on the bar where SMA(short) moves from at-or-below SMA(long) to
//! strictly above it, provided the trailing return volatility is at least the
//! threshold. Long exit on the opposite crossing. Equal averages never count as a
//! crossing.

use super::{positive_window, Strategy, StrategyInfo, StrategyParams};
use crate::domain::error::CryptobtError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::{PositionLatch, SignalSeries};

pub const NAME: &str = "sma_crossover";

const DEFAULTS: &[(&str, &str)] = &[
    ("short_window", "20"),
    ("long_window", "50"),
    ("volatility_window", "20"),
    ("volatility_threshold", "0.005"),
];

pub const INFO: StrategyInfo = StrategyInfo {
    name: NAME,
    summary: "SMA(short) crossing SMA(long), gated by return volatility",
    defaults: DEFAULTS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SmaCrossover {
    pub short_window: usize,
    pub long_window: usize,
    pub volatility_window: usize,
    /// Minimum return volatility for an entry; zero or below disables the filter.
    pub volatility_threshold: f64,
}

impl SmaCrossover {
    pub fn new(
        short_window: usize,
        long_window: usize,
        volatility_window: usize,
        volatility_threshold: f64,
    ) -> Result<Self, CryptobtError> {
        positive_window("short_window", short_window)?;
        positive_window("long_window", long_window)?;
        positive_window("volatility_window", volatility_window)?;
        if short_window >= long_window {
            return Err(CryptobtError::invalid_config(
                "strategy",
                "short_window",
                format!(
                    "short_window ({}) must be less than long_window ({})",
                    short_window, long_window
                ),
            ));
        }
        if !volatility_threshold.is_finite() {
            return Err(CryptobtError::invalid_config(
                "strategy",
                "volatility_threshold",
                "must be a finite number",
            ));
        }
        Ok(Self {
            short_window,
            long_window,
            volatility_window,
            volatility_threshold,
        })
    }

    pub fn from_params(params: &StrategyParams) -> Result<Self, CryptobtError> {
        params.ensure_known(DEFAULTS)?;
        Self::new(
            params.get_usize("short_window", 20)?,
            params.get_usize("long_window", 50)?,
            params.get_usize("volatility_window", 20)?,
            params.get_f64("volatility_threshold", 0.005)?,
        )
    }

    fn filter_enabled(&self) -> bool {
        self.volatility_threshold > 0.0
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &'static str {
        NAME
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        let mut types = vec![
            IndicatorType::Sma(self.short_window),
            IndicatorType::Sma(self.long_window),
        ];
        if self.filter_enabled() {
            types.push(IndicatorType::Volatility(self.volatility_window));
        }
        types
    }

    fn warmup(&self) -> usize {
        // a crossing compares bar i against i-1, so SMA(long) must be ready at i-1
        if self.filter_enabled() {
            self.long_window.max(self.volatility_window)
        } else {
            self.long_window
        }
    }

    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries {
        let indicators = compute_indicators(series.bars(), &self.indicators());
        let short = &indicators[&IndicatorType::Sma(self.short_window)];
        let long = &indicators[&IndicatorType::Sma(self.long_window)];
        let volatility = indicators.get(&IndicatorType::Volatility(self.volatility_window));

        let mut latch = PositionLatch::new();
        let signals = (0..series.len())
            .map(|i| {
                let (cross_up, cross_down) = if i == 0 {
                    (false, false)
                } else {
                    match (
                        short.simple_at(i - 1),
                        long.simple_at(i - 1),
                        short.simple_at(i),
                        long.simple_at(i),
                    ) {
                        (Some(prev_s), Some(prev_l), Some(s), Some(l)) => {
                            (prev_s <= prev_l && s > l, prev_s >= prev_l && s < l)
                        }
                        _ => (false, false),
                    }
                };

                let volatile_enough = match volatility {
                    Some(vol) => vol
                        .simple_at(i)
                        .is_some_and(|v| v >= self.volatility_threshold),
                    None => true,
                };

                latch.step(cross_up && volatile_enough, cross_down)
            })
            .collect();

        SignalSeries::new(series.symbol(), signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::signal::Signal;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                symbol: "BTCUSDT".into(),
                timestamp: start + chrono::Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new("BTCUSDT", bars).unwrap()
    }

    fn unfiltered(short: usize, long: usize) -> SmaCrossover {
        SmaCrossover::new(short, long, 2, 0.0).unwrap()
    }

    #[test]
    fn crossover_on_last_bar_of_short_scenario() {
        let s = series(&[100.0, 101.0, 99.0, 102.0, 103.0]);
        let signals = unfiltered(2, 3).generate_signals(&s);
        assert_eq!(
            signals.signals,
            vec![
                Signal::Flat,
                Signal::Flat,
                Signal::Flat,
                Signal::Flat,
                Signal::LongEntry
            ]
        );
    }

    #[test]
    fn entry_then_exit() {
        let s = series(&[10.0, 10.0, 10.0, 12.0, 14.0, 12.0, 8.0, 6.0]);
        let signals = unfiltered(2, 3).generate_signals(&s);
        assert_eq!(signals.get(3), Signal::LongEntry);
        assert_eq!(signals.get(6), Signal::LongExit);
        assert_eq!(signals.count(Signal::LongEntry), 1);
        assert_eq!(signals.count(Signal::LongExit), 1);
    }

    #[test]
    fn equal_averages_never_cross() {
        let s = series(&[10.0; 8]);
        let signals = unfiltered(2, 3).generate_signals(&s);
        assert!(signals.signals.iter().all(|&sig| sig == Signal::Flat));
    }

    #[test]
    fn volatility_filter_passes_and_blocks() {
        // return volatility at the crossing bar is about 0.0103
        let closes = [100.0, 101.0, 99.0, 102.0, 103.0];
        let low = SmaCrossover::new(2, 3, 2, 0.005).unwrap();
        assert_eq!(low.generate_signals(&series(&closes)).get(4), Signal::LongEntry);

        let high = SmaCrossover::new(2, 3, 2, 0.02).unwrap();
        assert_eq!(high.generate_signals(&series(&closes)).count(Signal::LongEntry), 0);
    }

    #[test]
    fn warmup_and_indicators_follow_filter() {
        let filtered = SmaCrossover::new(5, 10, 30, 0.01).unwrap();
        assert_eq!(filtered.warmup(), 30);
        assert_eq!(filtered.indicators().len(), 3);

        let plain = SmaCrossover::new(5, 10, 30, 0.0).unwrap();
        assert_eq!(plain.warmup(), 10);
        assert_eq!(plain.indicators().len(), 2);
    }

    #[test]
    fn rejects_short_not_below_long() {
        assert!(SmaCrossover::new(50, 50, 20, 0.0).is_err());
        assert!(SmaCrossover::new(60, 50, 20, 0.0).is_err());
        assert!(SmaCrossover::new(0, 50, 20, 0.0).is_err());
    }

    #[test]
    fn from_params_uses_defaults() {
        let strategy = SmaCrossover::from_params(&StrategyParams::new()).unwrap();
        assert_eq!(strategy.short_window, 20);
        assert_eq!(strategy.long_window, 50);
        assert_eq!(strategy.volatility_window, 20);
        assert!((strategy.volatility_threshold - 0.005).abs() < 1e-12);
    }

    #[test]
    fn series_shorter_than_windows_is_all_flat() {
        let s = series(&[1.0, 2.0, 3.0]);
        let signals = unfiltered(2, 10).generate_signals(&s);
        assert_eq!(signals.len(), 3);
        assert_eq!(signals.count(Signal::Flat), 3);
    }
}
