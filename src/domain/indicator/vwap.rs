//! Intraday VWAP with a daily session reset.
//!
//! VWAP[i] = sum(C[j] * V[j]) / sum(V[j]) for j from the first bar of i's session to i.
//! A session runs from one daily cutover (minutes past midnight UTC) to the next.
//! Points are invalid while the session's cumulative volume is still zero.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Minutes past midnight of a cutover time (seconds are dropped).
pub fn cutover_minutes(cutover: NaiveTime) -> u32 {
    cutover.num_seconds_from_midnight() / 60
}

/// Trading session a timestamp belongs to, labelled by the calendar day it starts on.
pub fn session_of(timestamp: NaiveDateTime, cutover_minutes: u32) -> NaiveDate {
    (timestamp - Duration::minutes(cutover_minutes as i64)).date()
}

pub fn calculate_vwap(bars: &[OhlcvBar], cutover_minutes: u32) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut current_session: Option<NaiveDate> = None;
    let mut cum_pv = 0.0;
    let mut cum_volume = 0.0;

    for bar in bars {
        let session = session_of(bar.timestamp, cutover_minutes);
        if current_session != Some(session) {
            current_session = Some(session);
            cum_pv = 0.0;
            cum_volume = 0.0;
        }

        cum_pv += bar.close * bar.volume;
        cum_volume += bar.volume;

        let valid = cum_volume > 0.0;
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Simple(if valid { cum_pv / cum_volume } else { 0.0 }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Vwap { cutover_minutes },
        values,
    }
}
