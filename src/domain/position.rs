//! Open positions and closed trade records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A long holding in one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Base-asset units; always positive.
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_bar: usize,
    /// quantity * entry_price
    pub notional: f64,
    pub entry_fee: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Cash taken out of the portfolio to open this position.
    pub fn committed(&self) -> f64 {
        self.notional + self.entry_fee
    }

    /// Mark-to-market PnL, net of the entry fee already paid.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price) - self.entry_fee
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    EndOfRun,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => f.write_str("signal"),
            ExitReason::EndOfRun => f.write_str("end_of_run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_notional: f64,
    pub exit_notional: f64,
    pub gross_pnl: f64,
    /// Entry plus exit fee.
    pub fees: f64,
    /// Realized PnL net of fees.
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    pub fn duration_bars(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }

    pub fn return_pct(&self) -> f64 {
        if self.entry_notional > 0.0 {
            self.pnl / self.entry_notional
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, minute, 0)
            .unwrap()
    }

    fn sample_position() -> Position {
        Position {
            symbol: "BTCUSDT".into(),
            quantity: 0.5,
            entry_price: 100.0,
            entry_time: ts(1),
            entry_bar: 1,
            notional: 50.0,
            entry_fee: 0.05,
        }
    }

    #[test]
    fn market_value_uses_quantity() {
        let pos = sample_position();
        assert!((pos.market_value(110.0) - 55.0).abs() < 1e-12);
    }

    #[test]
    fn committed_includes_entry_fee() {
        let pos = sample_position();
        assert!((pos.committed() - 50.05).abs() < 1e-12);
    }

    #[test]
    fn unrealized_pnl_profit_net_of_fee() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(110.0) - 4.95).abs() < 1e-12);
    }

    #[test]
    fn unrealized_pnl_at_entry_is_minus_fee() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(100.0) + 0.05).abs() < 1e-12);
    }

    #[test]
    fn closed_trade_duration_and_return() {
        let trade = ClosedTrade {
            symbol: "BTCUSDT".into(),
            quantity: 0.5,
            entry_price: 100.0,
            exit_price: 110.0,
            entry_time: ts(1),
            exit_time: ts(6),
            entry_bar: 1,
            exit_bar: 6,
            entry_notional: 50.0,
            exit_notional: 55.0,
            gross_pnl: 5.0,
            fees: 0.0,
            pnl: 5.0,
            exit_reason: ExitReason::Signal,
        };
        assert_eq!(trade.duration_bars(), 5);
        assert!((trade.return_pct() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn exit_reason_display() {
        assert_eq!(ExitReason::Signal.to_string(), "signal");
        assert_eq!(ExitReason::EndOfRun.to_string(), "end_of_run");
    }
}
