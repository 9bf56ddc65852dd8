//! Progression curve and ledger rules for the Life RPG gamification core.
//!
//! This crate holds the pure logic the engines build on. Nothing here
//! touches storage; every function is deterministic and callable in
//! isolation from tests.
//!
//! # Architecture
//!
//! - [`progression`] -- Level derivation from cumulative exp and the
//!   progress-bar view of a level.
//! - [`entry`] -- The [`EntryBuilder`] for validated ledger entries.
//! - [`reconciliation`] -- Checks that a user's ledger explains their
//!   account balances exactly.
//!
//! # Ledger Rules
//!
//! | Kind | Currency | Effect |
//! |------|----------|--------|
//! | `gold_in` | gold | `+amount` |
//! | `gold_out` | gold | `-amount` |
//! | `exp_in` | exp | `+amount` |
//!
//! Amounts are never negative and entries are never modified once
//! written.
//!
//! # Usage
//!
//! ```
//! use liferpg_ledger::progression::level_for_experience;
//!
//! assert_eq!(level_for_experience(0), 1);
//! assert_eq!(level_for_experience(100), 2);
//! assert_eq!(level_for_experience(300), 3);
//! ```

pub mod entry;
pub mod progression;
pub mod reconciliation;

// Re-export primary types at crate root.
pub use entry::EntryBuilder;
pub use progression::{level_for_experience, level_progress, MAX_LEVEL};
pub use reconciliation::{reconcile, Drift, ReconciliationResult};

use std::collections::BTreeMap;

use liferpg_types::{Currency, LedgerEntryId, LedgerEntryKind, UserId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when building ledger entries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Amount must not be negative; direction is carried by the kind.
    #[error("ledger entry amount must not be negative, got {amount}")]
    NegativeAmount {
        /// The invalid amount.
        amount: i64,
    },

    /// The balance after the change would be negative.
    #[error("{kind:?} entry would leave a negative balance of {balance}")]
    NegativeBalance {
        /// The entry kind being recorded.
        kind: LedgerEntryKind,
        /// The invalid resulting balance.
        balance: i64,
    },

    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

// ---------------------------------------------------------------------------
// Mismatch type
// ---------------------------------------------------------------------------

/// A disagreement between a user's ledger and their account balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerMismatch {
    /// The user whose ledger was checked.
    pub user_id: UserId,
    /// Per-currency totals that did not match the account.
    pub drifts: BTreeMap<Currency, Drift>,
    /// Entries whose recorded balance disagrees with the running total.
    pub broken_entries: Vec<LedgerEntryId>,
    /// Human-readable description of the mismatch.
    pub message: String,
}

impl core::fmt::Display for LedgerMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
