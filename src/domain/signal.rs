//! Trading signals emitted by strategies, one per bar.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    LongEntry,
    LongExit,
    Flat,
    ShortEntry,
    ShortExit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::LongEntry => "long_entry",
            Signal::LongExit => "long_exit",
            Signal::Flat => "flat",
            Signal::ShortEntry => "short_entry",
            Signal::ShortExit => "short_exit",
        };
        f.write_str(s)
    }
}

/// Signals for one instrument, index-aligned with its price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    pub symbol: String,
    pub signals: Vec<Signal>,
}

impl SignalSeries {
    pub fn new(symbol: impl Into<String>, signals: Vec<Signal>) -> Self {
        SignalSeries {
            symbol: symbol.into(),
            signals,
        }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, index: usize) -> Signal {
        self.signals.get(index).copied().unwrap_or(Signal::Flat)
    }

    pub fn count(&self, signal: Signal) -> usize {
        self.signals.iter().filter(|&&s| s == signal).count()
    }
}

/// Logical long/flat state of a strategy while it walks a series.
///
/// Turns raw entry/exit conditions into signals so that two entries are never
/// emitted without an exit in between.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionLatch {
    long: bool,
}

impl PositionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_long(&self) -> bool {
        self.long
    }

    pub fn step(&mut self, entry: bool, exit: bool) -> Signal {
        if self.long {
            if exit {
                self.long = false;
                Signal::LongExit
            } else {
                Signal::Flat
            }
        } else if entry {
            self.long = true;
            Signal::LongEntry
        } else {
            Signal::Flat
        }
    }
}
