//! OHLCV minute-bar representation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// close * volume, the bar's traded value in quote currency.
    pub fn quote_volume(&self) -> f64 {
        self.close * self.volume
    }

    /// Checks price positivity, volume sign and the high/low envelope.
    pub fn check(&self) -> Result<(), String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(format!("non-positive or non-finite price at {}", self.timestamp));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("negative or non-finite volume at {}", self.timestamp));
        }
        if self.high < self.open.max(self.close) || self.low > self.open.min(self.close) {
            return Err(format!("high/low do not bound open/close at {}", self.timestamp));
        }
        Ok(())
    }
}
