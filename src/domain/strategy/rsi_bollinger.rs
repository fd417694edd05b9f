//! Mean reversion on RSI and Bollinger Bands.
//!
//! Long entry when RSI is below `oversold` and the close is at or below the lower
//! band. Long exit when RSI rises above `overbought` or the close reaches the upper
//! band.

use super::{positive_window, Strategy, StrategyInfo, StrategyParams};
use crate::domain::error::CryptobtError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator::bollinger::mult_to_x100;
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::{PositionLatch, SignalSeries};

pub const NAME: &str = "rsi_bollinger";

const DEFAULTS: &[(&str, &str)] = &[
    ("rsi_period", "14"),
    ("bb_window", "20"),
    ("bb_std", "2.0"),
    ("oversold", "30"),
    ("overbought", "70"),
];

pub const INFO: StrategyInfo = StrategyInfo {
    name: NAME,
    summary: "buy oversold RSI below the lower band, sell overbought or upper band",
    defaults: DEFAULTS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RsiBollinger {
    pub rsi_period: usize,
    pub bb_window: usize,
    pub bb_std: f64,
    pub oversold: f64,
    pub overbought: f64,
    bb_std_x100: u32,
}

impl RsiBollinger {
    pub fn new(
        rsi_period: usize,
        bb_window: usize,
        bb_std: f64,
        oversold: f64,
        overbought: f64,
    ) -> Result<Self, CryptobtError> {
        positive_window("rsi_period", rsi_period)?;
        positive_window("bb_window", bb_window)?;
        let bb_std_x100 = mult_to_x100(bb_std).ok_or_else(|| {
            CryptobtError::invalid_config(
                "strategy",
                "bb_std",
                format!(
                    "bb_std must be a positive multiple of 0.01, got {}",
                    bb_std
                ),
            )
        })?;
        if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
            return Err(CryptobtError::invalid_config(
                "strategy",
                "oversold",
                "RSI levels must be within [0, 100]",
            ));
        }
        if oversold >= overbought {
            return Err(CryptobtError::invalid_config(
                "strategy",
                "oversold",
                format!(
                    "oversold ({}) must be less than overbought ({})",
                    oversold, overbought
                ),
            ));
        }
        Ok(Self {
            rsi_period,
            bb_window,
            bb_std,
            oversold,
            overbought,
            bb_std_x100,
        })
    }

    pub fn from_params(params: &StrategyParams) -> Result<Self, CryptobtError> {
        params.ensure_known(DEFAULTS)?;
        Self::new(
            params.get_usize("rsi_period", 14)?,
            params.get_usize("bb_window", 20)?,
            params.get_f64("bb_std", 2.0)?,
            params.get_f64("oversold", 30.0)?,
            params.get_f64("overbought", 70.0)?,
        )
    }

    fn bands(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bb_window,
            stddev_mult_x100: self.bb_std_x100,
        }
    }
}

impl Strategy for RsiBollinger {
    fn name(&self) -> &'static str {
        NAME
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Rsi(self.rsi_period), self.bands()]
    }

    fn warmup(&self) -> usize {
        self.rsi_period.max(self.bb_window - 1)
    }

    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries {
        let indicators = compute_indicators(series.bars(), &self.indicators());
        let rsi = &indicators[&IndicatorType::Rsi(self.rsi_period)];
        let bands = &indicators[&self.bands()];

        let mut latch = PositionLatch::new();
        let signals = series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| match (rsi.simple_at(i), bands.bands_at(i)) {
                (Some(r), Some((upper, _, lower))) => {
                    let entry = r < self.oversold && bar.close <= lower;
                    let exit = r > self.overbought || bar.close >= upper;
                    latch.step(entry, exit)
                }
                _ => latch.step(false, false),
            })
            .collect();

        SignalSeries::new(series.symbol(), signals)
    }
}
