//! Strategy interface and the built-in strategy variants.
//!
//! A strategy turns one [`PriceSeries`] into a [`SignalSeries`] of the same length.
//! Implementations compute their indicators once over the full series and then walk
//! the bars in order, reading nothing past the bar they are deciding on.

pub mod rsi_bollinger;
pub mod sma_crossover;
pub mod vwap_reversion;

use crate::domain::error::CryptobtError;
use crate::domain::indicator::IndicatorType;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::SignalSeries;
use chrono::NaiveTime;
use rayon::prelude::*;
use std::collections::BTreeMap;

pub use rsi_bollinger::RsiBollinger;
pub use sma_crossover::SmaCrossover;
pub use vwap_reversion::VwapReversion;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Indicators read by `generate_signals`.
    fn indicators(&self) -> Vec<IndicatorType>;

    /// Index of the first bar on which a signal can be emitted.
    fn warmup(&self) -> usize;

    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries;
}

/// Name, summary and default parameters of a built-in strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub summary: &'static str,
    pub defaults: &'static [(&'static str, &'static str)],
}

pub const STRATEGIES: &[StrategyInfo] = &[
    sma_crossover::INFO,
    rsi_bollinger::INFO,
    vwap_reversion::INFO,
];

pub fn available_strategies() -> Vec<&'static str> {
    STRATEGIES.iter().map(|s| s.name).collect()
}

pub fn build_strategy(
    name: &str,
    params: &StrategyParams,
) -> Result<Box<dyn Strategy>, CryptobtError> {
    let strategy: Box<dyn Strategy> = match name.trim() {
        sma_crossover::NAME => Box::new(SmaCrossover::from_params(params)?),
        rsi_bollinger::NAME => Box::new(RsiBollinger::from_params(params)?),
        vwap_reversion::NAME => Box::new(VwapReversion::from_params(params)?),
        other => {
            return Err(CryptobtError::UnknownStrategy {
                name: other.to_string(),
                available: available_strategies().join(", "),
            });
        }
    };
    Ok(strategy)
}

/// Generates signals for every instrument in parallel.
///
/// Fails before any work starts if a series is too short for the strategy's warm-up.
pub fn generate_all_signals(
    strategy: &dyn Strategy,
    series: &[PriceSeries],
) -> Result<Vec<SignalSeries>, CryptobtError> {
    let minimum = strategy.warmup() + 1;
    if let Some(short) = series.iter().find(|s| s.len() < minimum) {
        return Err(CryptobtError::InsufficientData {
            symbol: short.symbol().to_string(),
            bars: short.len(),
            minimum,
        });
    }

    Ok(series
        .par_iter()
        .map(|s| strategy.generate_signals(s))
        .collect())
}

/// Raw strategy parameters as read from configuration, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyParams {
    values: BTreeMap<String, String>,
}

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl ToString) {
        self.values
            .insert(key.trim().to_string(), value.to_string().trim().to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rejects any key the strategy does not understand.
    pub fn ensure_known(&self, known: &[(&str, &str)]) -> Result<(), CryptobtError> {
        match self
            .values
            .keys()
            .find(|k| !known.iter().any(|(name, _)| name == k))
        {
            Some(unknown) => Err(CryptobtError::invalid_config(
                "strategy",
                unknown,
                format!(
                    "unknown parameter (expected one of: {})",
                    known
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
            None => Ok(()),
        }
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, CryptobtError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(v) => v.parse::<usize>().map_err(|_| {
                CryptobtError::invalid_config("strategy", key, format!("'{}' is not a whole number", v))
            }),
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64, CryptobtError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(v) => match v.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n),
                _ => Err(CryptobtError::invalid_config(
                    "strategy",
                    key,
                    format!("'{}' is not a number", v),
                )),
            },
        }
    }

    /// Parses `HH:MM` (or `HH:MM:SS`) time-of-day values.
    pub fn get_time(&self, key: &str, default: NaiveTime) -> Result<NaiveTime, CryptobtError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(v) => NaiveTime::parse_from_str(v, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M:%S"))
                .map_err(|_| {
                    CryptobtError::invalid_config(
                        "strategy",
                        key,
                        format!("'{}' is not a time of day (HH:MM)", v),
                    )
                }),
        }
    }
}

pub(crate) fn positive_window(key: &str, value: usize) -> Result<usize, CryptobtError> {
    if value == 0 {
        return Err(CryptobtError::invalid_config(
            "strategy",
            key,
            "window must be at least 1",
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::signal::Signal;
    use chrono::NaiveDate;

    fn midnight() -> NaiveTime {
        NaiveTime::from_hms_opt(0, 0, 0).unwrap()
    }

    fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                symbol: symbol.into(),
                timestamp: start + chrono::Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }

    #[test]
    fn available_strategies_lists_all_variants() {
        assert_eq!(
            available_strategies(),
            vec!["sma_crossover", "rsi_bollinger", "vwap_reversion"]
        );
    }

    #[test]
    fn build_each_strategy_with_defaults() {
        for name in available_strategies() {
            let strategy = build_strategy(name, &StrategyParams::new()).unwrap();
            assert_eq!(strategy.name(), name);
            assert!(!strategy.indicators().is_empty());
        }
    }

    #[test]
    fn build_unknown_strategy() {
        let err = build_strategy("momentum", &StrategyParams::new())
            .err()
            .unwrap();
        match err {
            CryptobtError::UnknownStrategy { name, available } => {
                assert_eq!(name, "momentum");
                assert!(available.contains("sma_crossover"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn build_rejects_unknown_parameter() {
        let params = StrategyParams::new().with("shortwindow", 5);
        let err = build_strategy("sma_crossover", &params).err().unwrap();
        assert!(matches!(
            err,
            CryptobtError::ConfigInvalid { ref key, .. } if key == "shortwindow"
        ));
    }

    #[test]
    fn params_typed_getters() {
        let params = StrategyParams::new()
            .with("window", 12)
            .with("threshold", "0.25")
            .with("cutover", "08:30");
        assert_eq!(params.get_usize("window", 1).unwrap(), 12);
        assert_eq!(params.get_usize("missing", 7).unwrap(), 7);
        assert!((params.get_f64("threshold", 0.0).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(
            params.get_time("cutover", midnight()).unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
    }

    #[test]
    fn params_reject_malformed_values() {
        let params = StrategyParams::new()
            .with("window", "-3")
            .with("threshold", "abc")
            .with("cutover", "25:00");
        assert!(params.get_usize("window", 1).is_err());
        assert!(params.get_f64("threshold", 0.0).is_err());
        assert!(params.get_time("cutover", midnight()).is_err());
    }

    #[test]
    fn generate_all_signals_preserves_order_and_length() {
        let strategy = build_strategy(
            "sma_crossover",
            &StrategyParams::new()
                .with("short_window", 2)
                .with("long_window", 3)
                .with("volatility_window", 2)
                .with("volatility_threshold", 0.0),
        )
        .unwrap();
        let input = vec![
            series("AAA", &[100.0, 101.0, 99.0, 102.0, 103.0]),
            series("BBB", &[50.0, 50.0, 50.0, 50.0, 50.0]),
        ];
        let signals = generate_all_signals(strategy.as_ref(), &input).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].symbol, "AAA");
        assert_eq!(signals[1].symbol, "BBB");
        assert_eq!(signals[0].len(), 5);
        assert_eq!(signals[1].count(Signal::LongEntry), 0);
    }

    #[test]
    fn generate_all_signals_rejects_short_series() {
        let strategy = build_strategy("sma_crossover", &StrategyParams::new()).unwrap();
        let input = vec![series("AAA", &[100.0, 101.0, 102.0])];
        let err = generate_all_signals(strategy.as_ref(), &input).unwrap_err();
        assert!(matches!(
            err,
            CryptobtError::InsufficientData { bars: 3, minimum: 51, .. }
        ));
    }
}
