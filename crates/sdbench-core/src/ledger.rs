//! Append-only per-encounter cost ledger.

use crate::domain::{CostEntry, CostKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid charge {amount} for turn {turn}: amounts must be finite and non-negative")]
    InvalidAmount { turn: u32, amount: f64 },
}

/// Running total of everything charged in one encounter.
///
/// Entries are only ever appended, and every amount is non-negative, so the
/// total never decreases.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    entries: Vec<CostEntry>,
    total: f64,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a charge and return the new total.
    pub fn record(&mut self, turn: u32, kind: CostKind, amount: f64) -> Result<f64, LedgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidAmount { turn, amount });
        }
        self.entries.push(CostEntry { turn, kind, amount });
        self.total += amount;
        Ok(self.total)
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn entries(&self) -> &[CostEntry] {
        &self.entries
    }

    /// Sum of charges recorded against one turn.
    pub fn turn_total(&self, turn: u32) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.turn == turn)
            .map(|e| e.amount)
            .sum()
    }

    pub fn into_entries(self) -> Vec<CostEntry> {
        self.entries
    }
}
