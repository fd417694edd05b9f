//! Capital allocation across instruments competing for the same cash.

use super::error::CryptobtError;
use super::portfolio::ACCOUNTING_TOLERANCE;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPolicy {
    /// Starting capital split into equal slots; 0 means one slot per instrument.
    EqualWeight { max_positions: usize },
}

impl AllocationPolicy {
    pub fn parse(name: &str, max_positions: usize) -> Result<Self, CryptobtError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "equal_weight" | "equal" => Ok(AllocationPolicy::EqualWeight { max_positions }),
            other => Err(CryptobtError::invalid_config(
                "backtest",
                "allocation_policy",
                format!("unknown policy '{}' (available: equal_weight)", other),
            )),
        }
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        AllocationPolicy::EqualWeight { max_positions: 0 }
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationPolicy::EqualWeight { max_positions: 0 } => f.write_str("equal_weight"),
            AllocationPolicy::EqualWeight { max_positions } => {
                write!(f, "equal_weight(max {})", max_positions)
            }
        }
    }
}

/// Order in which same-bar entry candidates are offered capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    SymbolAscending,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AllocationDecision {
    /// Spend this much cash, fee included.
    Admit(f64),
    NoFreeSlot,
    InsufficientCash,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapitalAllocator {
    pub policy: AllocationPolicy,
    pub tie_break: TieBreak,
    slots: usize,
    commitment: f64,
}

impl CapitalAllocator {
    pub fn new(policy: AllocationPolicy, starting_capital: f64, instruments: usize) -> Self {
        let slots = match policy {
            AllocationPolicy::EqualWeight { max_positions: 0 } => instruments,
            AllocationPolicy::EqualWeight { max_positions } => max_positions,
        }
        .max(1);
        CapitalAllocator {
            policy,
            tie_break: TieBreak::SymbolAscending,
            slots,
            commitment: starting_capital / slots as f64,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Cash committed per position, fee included.
    pub fn commitment(&self) -> f64 {
        self.commitment
    }

    /// Sorts entry candidates into the order they are offered capital.
    pub fn order<T, F>(&self, candidates: &mut [T], symbol_of: F)
    where
        F: Fn(&T) -> &str,
    {
        match self.tie_break {
            TieBreak::SymbolAscending => candidates.sort_by(|a, b| symbol_of(a).cmp(symbol_of(b))),
        }
    }

    pub fn decide(&self, open_positions: usize, cash: f64) -> AllocationDecision {
        if open_positions >= self.slots {
            return AllocationDecision::NoFreeSlot;
        }
        // rounding can leave the last slot a hair short of a full commitment
        if cash < self.commitment * (1.0 - ACCOUNTING_TOLERANCE) {
            return AllocationDecision::InsufficientCash;
        }
        AllocationDecision::Admit(self.commitment.min(cash))
    }
}
