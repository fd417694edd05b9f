//! Performance metrics over a completed ledger.
//!
//! Crypto markets trade around the clock, so a year is 365 days of bars at the
//! run's bar interval.

use super::portfolio::{EquityPoint, Ledger};
use super::position::ClosedTrade;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Number of bars of `bar_interval` in a 365-day year.
pub fn periods_per_year(bar_interval: Duration) -> f64 {
    let seconds = bar_interval.num_seconds();
    if seconds > 0 {
        SECONDS_PER_YEAR / seconds as f64
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub starting_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior equity peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Mean holding period in bars.
    pub avg_trade_duration: f64,
    /// Traded notional (entries plus exits) over starting capital.
    pub turnover: f64,
    pub total_fees: f64,
}

impl Metrics {
    pub fn compute(ledger: &Ledger, bar_interval: Duration, risk_free_rate: f64) -> Self {
        let equity_curve = &ledger.equity_curve;
        let trades = &ledger.trades;
        let starting_capital = ledger.starting_capital;
        let final_equity = ledger.final_equity();
        let periods = periods_per_year(bar_interval);

        let total_return = if starting_capital > 0.0 {
            (final_equity - starting_capital) / starting_capital
        } else {
            0.0
        };

        let years = if periods > 0.0 {
            equity_curve.len() as f64 / periods
        } else {
            0.0
        };
        let annualized_return = if years > 0.0 && total_return.is_finite() {
            (1.0 + total_return).max(0.0).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let period_rf = if periods > 0.0 {
            risk_free_rate / periods
        } else {
            0.0
        };
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, period_rf, periods);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration_bars = 0usize;
        let mut traded_notional = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }

            total_duration_bars += trade.duration_bars();
            traded_notional += trade.entry_notional + trade.exit_notional;
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_trade_duration = if total_trades > 0 {
            total_duration_bars as f64 / total_trades as f64
        } else {
            0.0
        };

        let turnover = if starting_capital > 0.0 {
            traded_notional / starting_capital
        } else {
            0.0
        };

        Metrics {
            starting_capital,
            final_equity,
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_trade_duration,
            turnover,
            total_fees: ledger.total_fees,
        }
    }
}

/// Per-instrument trade summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub symbol: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_fees: f64,
}

impl SymbolResult {
    /// Groups trades by symbol, sorted by symbol.
    pub fn compute_per_symbol(trades: &[ClosedTrade]) -> Vec<SymbolResult> {
        let mut by_symbol: BTreeMap<&str, Vec<&ClosedTrade>> = BTreeMap::new();
        for trade in trades {
            by_symbol.entry(&trade.symbol).or_default().push(trade);
        }

        by_symbol
            .into_iter()
            .map(|(symbol, trades)| {
                let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
                let losing_trades = trades.iter().filter(|t| t.pnl < 0.0).count();
                SymbolResult {
                    symbol: symbol.to_string(),
                    total_trades: trades.len(),
                    winning_trades,
                    losing_trades,
                    win_rate: winning_trades as f64 / trades.len() as f64,
                    total_pnl: trades.iter().map(|t| t.pnl).sum(),
                    total_fees: trades.iter().map(|t| t.fees).sum(),
                }
            })
            .collect()
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], period_rf: f64, periods: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - period_rf;
    let annualize = periods.sqrt();

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * annualize
    } else {
        0.0
    };

    let downside_variance: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside_variance.sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * annualize
    } else {
        0.0
    };

    (sharpe, sortino)
}
