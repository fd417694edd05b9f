//! Intraday reversion to the session VWAP.
//!
//! Long entry when the close sits more than `threshold` (as a fraction of VWAP)
//! below the session VWAP. Long exit once the close is back at or above VWAP.
//! Signals fill on the next bar, so entries are suppressed when that fill bar would
//! be the session's last, and an open position is exited so that its fill lands no
//! later than the session's last bar. Nothing is carried across a session cutover.

use super::{Strategy, StrategyInfo, StrategyParams};
use crate::domain::error::CryptobtError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator::vwap::{cutover_minutes, session_of};
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::{PositionLatch, SignalSeries};
use chrono::{NaiveDateTime, NaiveTime};

pub const NAME: &str = "vwap_reversion";

const DEFAULTS: &[(&str, &str)] = &[("threshold", "0.01"), ("session_cutover", "00:00")];

pub const INFO: StrategyInfo = StrategyInfo {
    name: NAME,
    summary: "buy dips below session VWAP, flat by the end of each session",
    defaults: DEFAULTS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct VwapReversion {
    pub threshold: f64,
    /// Minutes past midnight UTC at which a new session starts.
    pub cutover_minutes: u32,
}

impl VwapReversion {
    pub fn new(threshold: f64, cutover_minutes: u32) -> Result<Self, CryptobtError> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(CryptobtError::invalid_config(
                "strategy",
                "threshold",
                "threshold must be non-negative",
            ));
        }
        if cutover_minutes >= 24 * 60 {
            return Err(CryptobtError::invalid_config(
                "strategy",
                "session_cutover",
                "cutover must be a time of day",
            ));
        }
        Ok(Self {
            threshold,
            cutover_minutes,
        })
    }

    pub fn from_params(params: &StrategyParams) -> Result<Self, CryptobtError> {
        params.ensure_known(DEFAULTS)?;
        Self::new(
            params.get_f64("threshold", 0.01)?,
            cutover_minutes(params.get_time("session_cutover", NaiveTime::default())?),
        )
    }

    /// Where the fill bar following `timestamp` sits relative to its session:
    /// (inside the same session, is that session's last bar).
    fn fill_position(&self, timestamp: NaiveDateTime, interval: chrono::Duration) -> (bool, bool) {
        let session = session_of(timestamp, self.cutover_minutes);
        let fill = timestamp + interval;
        let fill_session = session_of(fill, self.cutover_minutes);
        let fill_is_last = session_of(fill + interval, self.cutover_minutes) != fill_session;
        (fill_session == session, fill_is_last)
    }
}

impl Strategy for VwapReversion {
    fn name(&self) -> &'static str {
        NAME
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Vwap {
            cutover_minutes: self.cutover_minutes,
        }]
    }

    fn warmup(&self) -> usize {
        0
    }

    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries {
        let indicators = compute_indicators(series.bars(), &self.indicators());
        let vwap = &indicators[&IndicatorType::Vwap {
            cutover_minutes: self.cutover_minutes,
        }];
        let interval = series.interval();

        let mut latch = PositionLatch::new();
        let signals = series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let (fill_in_session, fill_is_last) = self.fill_position(bar.timestamp, interval);
                let session_ending = !fill_in_session || fill_is_last;

                let (stretched, reverted) = match vwap.simple_at(i) {
                    Some(v) => ((v - bar.close) / v > self.threshold, bar.close >= v),
                    None => (false, false),
                };

                latch.step(stretched && !session_ending, reverted || session_ending)
            })
            .collect();

        SignalSeries::new(series.symbol(), signals)
    }
}
