//! Fill simulation for long entries and exits.
//!
//! Fills happen at a given market price with no slippage; the only cost is a
//! proportional fee on traded notional.

use chrono::NaiveDateTime;

use super::error::CryptobtError;
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Fraction of notional charged on every fill.
    pub fee_rate: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig { fee_rate: 0.001 }
    }
}

pub fn calculate_fee(notional: f64, config: &ExecutionConfig) -> f64 {
    notional * config.fee_rate
}

/// Splits a cash commitment into the position notional and its entry fee.
pub fn split_commitment(commitment: f64, config: &ExecutionConfig) -> (f64, f64) {
    let notional = commitment / (1.0 + config.fee_rate);
    (notional, calculate_fee(notional, config))
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        execution_price: f64,
        notional: f64,
        fee: f64,
    },
    InsufficientCapital,
    AlreadyOpen,
}

/// Opens a long position in `symbol` spending `commitment` of cash, fee included.
pub fn enter_long(
    portfolio: &mut Portfolio,
    symbol: &str,
    market_price: f64,
    time: NaiveDateTime,
    bar: usize,
    commitment: f64,
    config: &ExecutionConfig,
) -> Result<EntryResult, CryptobtError> {
    if portfolio.has_position(symbol) {
        return Ok(EntryResult::AlreadyOpen);
    }
    if !(commitment > 0.0) || commitment > portfolio.cash {
        return Ok(EntryResult::InsufficientCapital);
    }
    if !(market_price.is_finite() && market_price > 0.0) {
        return Err(CryptobtError::InvariantViolation {
            bar,
            reason: format!("{} fill price {} is not positive", symbol, market_price),
        });
    }

    let (notional, fee) = split_commitment(commitment, config);
    let quantity = notional / market_price;

    portfolio.cash -= notional + fee;
    portfolio.total_fees += fee;
    portfolio.add_position(Position {
        symbol: symbol.to_string(),
        quantity,
        entry_price: market_price,
        entry_time: time,
        entry_bar: bar,
        notional,
        entry_fee: fee,
    });

    Ok(EntryResult::Entered {
        quantity,
        execution_price: market_price,
        notional,
        fee,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub quantity: f64,
    pub exit_price: f64,
    pub exit_notional: f64,
    pub exit_fee: f64,
    pub pnl: f64,
}

/// Closes the position in `symbol` at `market_price`, if one is open.
pub fn exit_position(
    portfolio: &mut Portfolio,
    symbol: &str,
    market_price: f64,
    time: NaiveDateTime,
    bar: usize,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    let position = portfolio.remove_position(symbol)?;

    let exit_notional = position.quantity * market_price;
    let exit_fee = calculate_fee(exit_notional, config);
    let gross_pnl = position.quantity * (market_price - position.entry_price);
    let pnl = gross_pnl - position.entry_fee - exit_fee;

    portfolio.cash += exit_notional - exit_fee;
    portfolio.total_fees += exit_fee;

    portfolio.record_trade(ClosedTrade {
        symbol: position.symbol,
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price: market_price,
        entry_time: position.entry_time,
        exit_time: time,
        entry_bar: position.entry_bar,
        exit_bar: bar,
        entry_notional: position.notional,
        exit_notional,
        gross_pnl,
        fees: position.entry_fee + exit_fee,
        pnl,
        exit_reason: reason,
    });

    Some(ExitResult {
        quantity: position.quantity,
        exit_price: market_price,
        exit_notional,
        exit_fee,
        pnl,
    })
}
