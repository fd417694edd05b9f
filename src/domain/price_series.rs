//! Immutable per-instrument price series and shared calendar validation.

use crate::domain::error::CryptobtError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::{Duration, NaiveDateTime};

/// Dense, fixed-interval OHLCV series for one trading pair.
///
/// Construction validates every bar and the spacing of timestamps; once built the
/// series is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    interval: Duration,
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, CryptobtError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(CryptobtError::NoData { symbol });
        }

        let invalid = |reason: String| CryptobtError::InvalidSeries {
            symbol: symbol.clone(),
            reason,
        };

        for bar in &bars {
            bar.check().map_err(invalid)?;
        }

        let interval = if bars.len() > 1 {
            bars[1].timestamp - bars[0].timestamp
        } else {
            Duration::minutes(1)
        };
        for pair in bars.windows(2) {
            let step = pair[1].timestamp - pair[0].timestamp;
            if step <= Duration::zero() {
                return Err(invalid(format!(
                    "timestamps not strictly increasing at {}",
                    pair[1].timestamp
                )));
            }
            if step != interval {
                return Err(invalid(format!(
                    "gap between {} and {} (expected {}s spacing)",
                    pair[0].timestamp,
                    pair[1].timestamp,
                    interval.num_seconds()
                )));
            }
        }

        Ok(Self {
            symbol,
            interval,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> &OhlcvBar {
        &self.bars[index]
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.bars.iter().map(|b| b.timestamp)
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.bars[0].timestamp
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.bars[self.bars.len() - 1].timestamp
    }

    /// Total close * volume over the series.
    pub fn quote_volume(&self) -> f64 {
        self.bars.iter().map(OhlcvBar::quote_volume).sum()
    }
}

/// Returns the calendar shared by every series, or fails on the first mismatch.
pub fn validate_calendar(series: &[PriceSeries]) -> Result<Vec<NaiveDateTime>, CryptobtError> {
    let Some(reference) = series.first() else {
        return Err(CryptobtError::NoData {
            symbol: "all".to_string(),
        });
    };

    for other in &series[1..] {
        if other.len() != reference.len() {
            return Err(CryptobtError::MisalignedCalendar {
                symbol: other.symbol.clone(),
                reason: format!(
                    "{} bars, {} has {}",
                    other.len(),
                    reference.symbol,
                    reference.len()
                ),
            });
        }
        if let Some((i, (a, b))) = reference
            .timestamps()
            .zip(other.timestamps())
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(CryptobtError::MisalignedCalendar {
                symbol: other.symbol.clone(),
                reason: format!("bar {} at {}, {} has {}", i, b, reference.symbol, a),
            });
        }
    }

    Ok(reference.timestamps().collect())
}
