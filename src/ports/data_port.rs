//! Market data access port.

use crate::domain::error::CryptobtError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::price_series::PriceSeries;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Bars for `symbol` with `start <= timestamp <= end`, in timestamp order.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<OhlcvBar>, CryptobtError>;

    fn list_symbols(&self) -> Result<Vec<String>, CryptobtError>;

    /// First timestamp, last timestamp and bar count stored for `symbol`.
    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, CryptobtError>;

    fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<PriceSeries, CryptobtError> {
        PriceSeries::new(symbol, self.fetch_bars(symbol, start, end)?)
    }
}
