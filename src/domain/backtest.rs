//! Multi-instrument portfolio simulation.
//!
//! The simulator replays a shared bar calendar once. A signal observed on bar i's
//! close executes at bar i+1's open. Within a bar, queued exits run first, then
//! queued entries in the allocator's tie-break order, then every open position is
//! marked to the close and an equity point is recorded. On the final bar all open
//! positions are liquidated at the close before equity is recorded.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::allocation::{AllocationDecision, AllocationPolicy, CapitalAllocator};
use super::error::CryptobtError;
use super::execution::{enter_long, exit_position, EntryResult, ExecutionConfig};
use super::metrics::{Metrics, SymbolResult};
use super::portfolio::{Ledger, Portfolio};
use super::position::ExitReason;
use super::price_series::{validate_calendar, PriceSeries};
use super::signal::{Signal, SignalSeries};
use super::strategy::{generate_all_signals, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub starting_capital: f64,
    pub fee_rate: f64,
    pub allocation: AllocationPolicy,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            starting_capital: 10_000.0,
            fee_rate: 0.001,
            allocation: AllocationPolicy::default(),
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), CryptobtError> {
        if !(self.starting_capital.is_finite() && self.starting_capital > 0.0) {
            return Err(CryptobtError::invalid_config(
                "backtest",
                "starting_capital",
                "starting_capital must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(CryptobtError::invalid_config(
                "backtest",
                "fee_rate",
                "fee_rate must be in [0, 1)",
            ));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(CryptobtError::invalid_config(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Simulator {
    config: BacktestConfig,
    execution: ExecutionConfig,
}

impl Simulator {
    pub fn new(config: BacktestConfig) -> Result<Self, CryptobtError> {
        config.validate()?;
        let execution = ExecutionConfig {
            fee_rate: config.fee_rate,
        };
        Ok(Simulator { config, execution })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(
        &self,
        prices: &[PriceSeries],
        signals: &[SignalSeries],
    ) -> Result<Ledger, CryptobtError> {
        let instruments = pair_instruments(prices, signals)?;
        let calendar = validate_calendar(prices)?;
        let last = calendar.len() - 1;

        let allocator = CapitalAllocator::new(
            self.config.allocation,
            self.config.starting_capital,
            instruments.len(),
        );
        let mut portfolio = Portfolio::new(self.config.starting_capital);

        info!(
            instruments = instruments.len(),
            bars = calendar.len(),
            slots = allocator.slots(),
            commitment = allocator.commitment(),
            "starting simulation"
        );

        for (i, &timestamp) in calendar.iter().enumerate() {
            if i > 0 {
                for (series, sigs) in &instruments {
                    if sigs.get(i - 1) == Signal::LongExit {
                        exit_position(
                            &mut portfolio,
                            series.symbol(),
                            series.bar(i).open,
                            timestamp,
                            i,
                            ExitReason::Signal,
                            &self.execution,
                        );
                    }
                }

                let mut candidates: Vec<&(&PriceSeries, &SignalSeries)> = instruments
                    .iter()
                    .filter(|(series, sigs)| {
                        sigs.get(i - 1) == Signal::LongEntry
                            && !portfolio.has_position(series.symbol())
                    })
                    .collect();
                allocator.order(&mut candidates, |(series, _)| series.symbol());

                for (series, _) in candidates {
                    match allocator.decide(portfolio.position_count(), portfolio.cash) {
                        AllocationDecision::Admit(commitment) => {
                            let result = enter_long(
                                &mut portfolio,
                                series.symbol(),
                                series.bar(i).open,
                                timestamp,
                                i,
                                commitment,
                                &self.execution,
                            )?;
                            if let EntryResult::Entered { quantity, .. } = result {
                                debug!(bar = i, symbol = series.symbol(), quantity, "entered");
                            }
                        }
                        refused => {
                            debug!(bar = i, symbol = series.symbol(), reason = ?refused, "entry skipped");
                        }
                    }
                }
            }

            if i == last {
                for (series, _) in &instruments {
                    exit_position(
                        &mut portfolio,
                        series.symbol(),
                        series.bar(i).close,
                        timestamp,
                        i,
                        ExitReason::EndOfRun,
                        &self.execution,
                    );
                }
            }

            let point = portfolio.mark_to_market(timestamp, |symbol| {
                instruments
                    .binary_search_by(|(series, _)| series.symbol().cmp(symbol))
                    .ok()
                    .map(|k| instruments[k].0.bar(i).close)
            });
            portfolio.check_invariants(i, &point)?;
            portfolio.record_equity(point);
        }

        let ledger = portfolio.into_ledger();
        info!(
            trades = ledger.trades.len(),
            final_equity = ledger.final_equity(),
            total_fees = ledger.total_fees,
            "simulation complete"
        );
        Ok(ledger)
    }
}

/// Matches each price series with its signal series, sorted by symbol.
fn pair_instruments<'a>(
    prices: &'a [PriceSeries],
    signals: &'a [SignalSeries],
) -> Result<Vec<(&'a PriceSeries, &'a SignalSeries)>, CryptobtError> {
    if prices.is_empty() {
        return Err(CryptobtError::NoData {
            symbol: "all".to_string(),
        });
    }
    if prices.len() != signals.len() {
        return Err(CryptobtError::SignalMismatch {
            symbol: "all".to_string(),
            reason: format!(
                "{} price series but {} signal series",
                prices.len(),
                signals.len()
            ),
        });
    }

    let mut by_symbol: HashMap<&str, &SignalSeries> = HashMap::with_capacity(signals.len());
    for sigs in signals {
        if by_symbol.insert(sigs.symbol.as_str(), sigs).is_some() {
            return Err(CryptobtError::SignalMismatch {
                symbol: sigs.symbol.clone(),
                reason: "duplicate signal series".to_string(),
            });
        }
    }

    let mut seen = HashSet::with_capacity(prices.len());
    let mut instruments = Vec::with_capacity(prices.len());
    for series in prices {
        if !seen.insert(series.symbol()) {
            return Err(CryptobtError::InvalidSeries {
                symbol: series.symbol().to_string(),
                reason: "duplicate symbol".to_string(),
            });
        }
        let sigs = by_symbol
            .get(series.symbol())
            .ok_or_else(|| CryptobtError::SignalMismatch {
                symbol: series.symbol().to_string(),
                reason: "no signal series".to_string(),
            })?;
        if sigs.len() != series.len() {
            return Err(CryptobtError::SignalMismatch {
                symbol: series.symbol().to_string(),
                reason: format!("{} signals for {} bars", sigs.len(), series.len()),
            });
        }
        instruments.push((series, *sigs));
    }

    instruments.sort_by(|a, b| a.0.symbol().cmp(b.0.symbol()));
    Ok(instruments)
}

/// Everything produced by one strategy run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy: String,
    pub ledger: Ledger,
    pub metrics: Metrics,
    pub symbols: Vec<SymbolResult>,
}

/// Generates signals, simulates and computes metrics.
pub fn run_backtest(
    strategy: &dyn Strategy,
    series: &[PriceSeries],
    config: &BacktestConfig,
) -> Result<BacktestResult, CryptobtError> {
    let simulator = Simulator::new(config.clone())?;
    validate_calendar(series)?;

    info!(strategy = strategy.name(), instruments = series.len(), "generating signals");
    let signals = generate_all_signals(strategy, series)?;
    let ledger = simulator.run(series, &signals)?;

    let metrics = Metrics::compute(&ledger, series[0].interval(), config.risk_free_rate);
    let symbols = SymbolResult::compute_per_symbol(&ledger.trades);

    Ok(BacktestResult {
        strategy: strategy.name().to_string(),
        ledger,
        metrics,
        symbols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;

    fn series(symbol: &str, opens: &[f64], closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = opens
            .iter()
            .zip(closes)
            .enumerate()
            .map(|(i, (&open, &close))| OhlcvBar {
                symbol: symbol.into(),
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume: 1.0,
            })
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }

    fn signals(symbol: &str, s: &[Signal]) -> SignalSeries {
        SignalSeries::new(symbol, s.to_vec())
    }

    fn zero_fee(capital: f64) -> Simulator {
        Simulator::new(BacktestConfig {
            starting_capital: capital,
            fee_rate: 0.0,
            ..Default::default()
        })
        .unwrap()
    }

    use Signal::{Flat as F, LongEntry as E, LongExit as X};

    #[test]
    fn config_validation() {
        assert!(BacktestConfig::default().validate().is_ok());
        let bad_capital = BacktestConfig {
            starting_capital: 0.0,
            ..Default::default()
        };
        assert!(Simulator::new(bad_capital).is_err());
        let bad_fee = BacktestConfig {
            fee_rate: 1.0,
            ..Default::default()
        };
        assert!(bad_fee.validate().is_err());
    }

    #[test]
    fn entry_fills_at_next_open_and_exit_at_next_open() {
        let prices = series(
            "BTCUSDT",
            &[10.0, 20.0, 25.0, 40.0, 50.0],
            &[11.0, 22.0, 30.0, 45.0, 55.0],
        );
        let sigs = signals("BTCUSDT", &[E, F, X, F, F]);
        let ledger = zero_fee(1_000.0).run(&[prices], &[sigs]).unwrap();

        assert_eq!(ledger.trades.len(), 1);
        let trade = &ledger.trades[0];
        assert_eq!(trade.entry_price, 20.0);
        assert_eq!(trade.exit_price, 40.0);
        assert_eq!(trade.entry_bar, 1);
        assert_eq!(trade.exit_bar, 3);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert!((ledger.final_equity() - 2_000.0).abs() < 1e-9);
        assert_eq!(ledger.equity_curve.len(), 5);
    }

    #[test]
    fn open_position_is_liquidated_at_last_close() {
        let prices = series("ETHUSDT", &[10.0, 10.0, 10.0], &[10.0, 12.0, 15.0]);
        let sigs = signals("ETHUSDT", &[E, F, F]);
        let ledger = zero_fee(100.0).run(&[prices], &[sigs]).unwrap();

        assert_eq!(ledger.trades.len(), 1);
        assert_eq!(ledger.trades[0].exit_reason, ExitReason::EndOfRun);
        assert_eq!(ledger.trades[0].exit_price, 15.0);
        let last = ledger.equity_curve.last().unwrap();
        assert_eq!(last.open_positions, 0);
        assert!((last.equity - 150.0).abs() < 1e-9);
        assert!((last.cash - 150.0).abs() < 1e-9);
    }

    #[test]
    fn signal_on_last_bar_never_executes() {
        let prices = series("BTCUSDT", &[10.0, 10.0], &[10.0, 10.0]);
        let sigs = signals("BTCUSDT", &[F, E]);
        let ledger = zero_fee(100.0).run(&[prices], &[sigs]).unwrap();
        assert!(ledger.trades.is_empty());
        assert!((ledger.final_equity() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exit_before_entry_frees_capital_same_bar() {
        let config = BacktestConfig {
            starting_capital: 100.0,
            fee_rate: 0.0,
            allocation: AllocationPolicy::EqualWeight { max_positions: 1 },
            risk_free_rate: 0.0,
        };
        let a = series("AAA", &[10.0; 4], &[10.0; 4]);
        let b = series("BBB", &[5.0; 4], &[5.0; 4]);
        let sa = signals("AAA", &[E, X, F, F]);
        let sb = signals("BBB", &[F, E, F, F]);
        let ledger = Simulator::new(config).unwrap().run(&[a, b], &[sa, sb]).unwrap();

        assert_eq!(ledger.trades.len(), 2);
        let bbb = ledger.trades.iter().find(|t| t.symbol == "BBB").unwrap();
        assert_eq!(bbb.entry_bar, 2);
        assert_eq!(bbb.exit_reason, ExitReason::EndOfRun);
    }

    #[test]
    fn fees_are_charged_on_both_legs() {
        let prices = series("BTCUSDT", &[100.0; 3], &[100.0; 3]);
        let sigs = signals("BTCUSDT", &[E, F, F]);
        let config = BacktestConfig {
            starting_capital: 1_001.0,
            fee_rate: 0.001,
            ..Default::default()
        };
        let ledger = Simulator::new(config).unwrap().run(&[prices], &[sigs]).unwrap();
        // 1000 notional in, 1000 out: 1.0 + 1.0 in fees
        assert!((ledger.total_fees - 2.0).abs() < 1e-9);
        assert!((ledger.final_equity() - 999.0).abs() < 1e-9);
        assert!((ledger.trades[0].pnl + 2.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_mismatched_signal_length() {
        let prices = series("BTCUSDT", &[1.0; 3], &[1.0; 3]);
        let sigs = signals("BTCUSDT", &[F, F]);
        let err = zero_fee(100.0).run(&[prices], &[sigs]).unwrap_err();
        assert!(matches!(err, CryptobtError::SignalMismatch { .. }));
    }

    #[test]
    fn rejects_unmatched_symbol() {
        let prices = series("BTCUSDT", &[1.0; 3], &[1.0; 3]);
        let sigs = signals("ETHUSDT", &[F, F, F]);
        let err = zero_fee(100.0).run(&[prices], &[sigs]).unwrap_err();
        assert!(matches!(err, CryptobtError::SignalMismatch { ref symbol, .. } if symbol == "BTCUSDT"));
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let a = series("BTCUSDT", &[1.0; 3], &[1.0; 3]);
        let sa = signals("BTCUSDT", &[F, F, F]);
        let err = zero_fee(100.0)
            .run(&[a.clone(), a], &[sa.clone(), sa])
            .unwrap_err();
        assert!(matches!(err, CryptobtError::SignalMismatch { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        let err = zero_fee(100.0).run(&[], &[]).unwrap_err();
        assert!(matches!(err, CryptobtError::NoData { .. }));
    }

    #[test]
    fn rejects_misaligned_calendars() {
        let a = series("AAA", &[1.0; 3], &[1.0; 3]);
        let b = series("BBB", &[1.0; 4], &[1.0; 4]);
        let err = zero_fee(100.0)
            .run(&[a, b], &[signals("AAA", &[F; 3]), signals("BBB", &[F; 4])])
            .unwrap_err();
        assert!(matches!(err, CryptobtError::MisalignedCalendar { .. }));
    }
}
