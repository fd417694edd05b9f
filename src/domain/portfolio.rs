//! Portfolio state, equity tracking and the frozen ledger of a run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::CryptobtError;
use super::position::{ClosedTrade, Position};

/// Relative tolerance used by the accounting invariants.
pub const ACCOUNTING_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub cash: f64,
    pub realized_pnl: f64,
    /// Net of the entry fees of open positions.
    pub unrealized_pnl: f64,
    pub open_positions: usize,
    pub committed: f64,
}

/// Write-once record of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub starting_capital: f64,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub total_fees: f64,
}

impl Ledger {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.starting_capital)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub starting_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub realized_pnl: f64,
    pub total_fees: f64,
}

impl Portfolio {
    pub fn new(starting_capital: f64) -> Self {
        Portfolio {
            cash: starting_capital,
            starting_capital,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            realized_pnl: 0.0,
            total_fees: 0.0,
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn remove_position(&mut self, symbol: &str) -> Option<Position> {
        self.positions.remove(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.realized_pnl += trade.pnl;
        self.closed_trades.push(trade);
    }

    pub fn committed(&self) -> f64 {
        self.positions.values().map(Position::committed).sum()
    }

    /// Marks every open position with `price_of` and returns the equity point for `timestamp`.
    pub fn mark_to_market<F>(&self, timestamp: NaiveDateTime, price_of: F) -> EquityPoint
    where
        F: Fn(&str) -> Option<f64>,
    {
        let (market_value, unrealized) = self
            .positions
            .values()
            .filter_map(|pos| {
                price_of(&pos.symbol).map(|p| (pos.market_value(p), pos.unrealized_pnl(p)))
            })
            .fold((0.0, 0.0), |(mv, u), (m, p)| (mv + m, u + p));

        EquityPoint {
            timestamp,
            equity: self.cash + market_value,
            cash: self.cash,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: unrealized,
            open_positions: self.positions.len(),
            committed: self.committed(),
        }
    }

    pub fn record_equity(&mut self, point: EquityPoint) {
        self.equity_curve.push(point);
    }

    /// Checks the accounting identities for the state captured in `point`.
    pub fn check_invariants(&self, bar: usize, point: &EquityPoint) -> Result<(), CryptobtError> {
        let tolerance = ACCOUNTING_TOLERANCE * self.starting_capital.max(point.equity.abs());
        let violation = |reason: String| Err(CryptobtError::InvariantViolation { bar, reason });

        if !point.cash.is_finite() || point.cash < -tolerance {
            return violation(format!("cash is {}", point.cash));
        }
        if let Some(pos) = self
            .positions
            .values()
            .find(|p| !(p.quantity.is_finite() && p.quantity > 0.0))
        {
            return violation(format!("{} has quantity {}", pos.symbol, pos.quantity));
        }
        if point.committed > self.starting_capital + tolerance {
            return violation(format!(
                "committed {} exceeds starting capital {}",
                point.committed, self.starting_capital
            ));
        }
        let expected = self.starting_capital + point.realized_pnl + point.unrealized_pnl;
        if !point.equity.is_finite() || (point.equity - expected).abs() > tolerance {
            return violation(format!(
                "equity {} != starting capital + realized + unrealized = {}",
                point.equity, expected
            ));
        }
        Ok(())
    }

    /// Freezes the run into its ledger.
    pub fn into_ledger(self) -> Ledger {
        Ledger {
            starting_capital: self.starting_capital,
            trades: self.closed_trades,
            equity_curve: self.equity_curve,
            total_fees: self.total_fees,
        }
    }
}
